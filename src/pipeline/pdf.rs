//! PDF text extraction with three-tier degradation.
//!
//! A PDF upload never fails the request. The user's change description can
//! carry the analysis on its own, so when the text layer is missing or the
//! file will not parse we hand the model an explanation instead of the text:
//!
//! | Outcome | Mode |
//! |---------|------|
//! | ≥ 10 chars of text | [`ExtractionMode::Full`] |
//! | parsed, < 10 chars (scanned / image-only) | [`ExtractionMode::FallbackMetadata`] |
//! | too short, bad magic, pdfium error | [`ExtractionMode::FallbackError`] |
//!
//! The header check runs before pdfium is touched, so truncated uploads and
//! mislabelled files are rejected without loading the library at all.
//!
//! pdfium is not async-safe, so parsing runs under `spawn_blocking`.

use crate::document::{ExtractedText, ExtractionMode, SourceFormat, UploadedDocument};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files shorter than this cannot be a meaningful PDF.
pub const MIN_PDF_BYTES: usize = 100;

/// Every PDF starts with this signature.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Below this many (trimmed) characters the text layer is treated as absent.
pub const MIN_TEXT_CHARS: usize = 10;

/// Default page ceiling for text extraction.
pub const DEFAULT_MAX_PAGES: usize = 50;

const UNTITLED: &str = "untitled";
const UNKNOWN_AUTHOR: &str = "unknown author";

const MANUAL_DESCRIPTION_HINT: &str = "Please describe the relevant document content together with \
the intended changes in the changes field. The analysis will be based on that description.";

/// PDF variant of the text extractor.
#[derive(Debug, Clone)]
pub struct PdfExtractor {
    max_pages: usize,
    library_path: Option<PathBuf>,
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            library_path: None,
        }
    }
}

/// What pdfium gave us before the tiering decision.
#[derive(Debug)]
struct ParsedPdf {
    text: String,
    title: Option<String>,
    author: Option<String>,
    page_count: usize,
}

impl PdfExtractor {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages: max_pages.max(1),
            ..Self::default()
        }
    }

    /// Bind to a specific pdfium library instead of the system one.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    /// Extract text from a PDF upload. Infallible by design of the tiers above.
    pub async fn extract(&self, document: UploadedDocument) -> ExtractedText {
        let size = document.bytes.len();
        let file_name = document.file_name;

        if let Err(reason) = check_header(&document.bytes) {
            warn!("PDF '{}' rejected before parsing: {}", file_name, reason);
            return fallback_error(&file_name, size);
        }

        let bytes = document.bytes;
        let max_pages = self.max_pages;
        let library_path = self.library_path.clone();

        let parsed = tokio::task::spawn_blocking(move || {
            parse_blocking(&bytes, max_pages, library_path.as_deref())
        })
        .await;

        match parsed {
            Ok(Ok(parsed)) => classify(parsed, &file_name, size),
            Ok(Err(detail)) => {
                warn!("PDF '{}' could not be parsed: {}", file_name, detail);
                fallback_error(&file_name, size)
            }
            Err(e) => {
                warn!("PDF '{}' extraction task panicked: {}", file_name, e);
                fallback_error(&file_name, size)
            }
        }
    }
}

/// Cheap structural checks; no parsing.
fn check_header(bytes: &[u8]) -> Result<(), String> {
    if bytes.len() < MIN_PDF_BYTES {
        return Err(format!(
            "{} bytes is below the {} byte minimum",
            bytes.len(),
            MIN_PDF_BYTES
        ));
    }
    if &bytes[..4] != PDF_MAGIC {
        return Err(format!("missing %PDF signature, first bytes: {:?}", &bytes[..4]));
    }
    Ok(())
}

fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, String> {
    let bindings = match library_path {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| format!("failed to bind pdfium: {:?}", e))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking pdfium work: text of the first `max_pages` pages plus metadata.
fn parse_blocking(
    bytes: &[u8],
    max_pages: usize,
    library_path: Option<&Path>,
) -> Result<ParsedPdf, String> {
    let pdfium = bind_pdfium(library_path)?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("{:?}", e))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    if page_count > max_pages {
        info!(
            "PDF has {} pages; extracting text from the first {}",
            page_count, max_pages
        );
    }

    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate().take(max_pages) {
        let page_text = page
            .text()
            .map_err(|e| format!("page {}: {:?}", idx + 1, e))?
            .all();
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&page_text);
    }

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    debug!("pdfium extracted {} chars from {} pages", text.len(), page_count);

    Ok(ParsedPdf {
        text,
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        page_count,
    })
}

/// Decide between `Full` and `FallbackMetadata` for a successfully parsed file.
fn classify(parsed: ParsedPdf, file_name: &str, size: usize) -> ExtractedText {
    let trimmed = parsed.text.trim();
    if trimmed.chars().count() >= MIN_TEXT_CHARS {
        info!(
            "PDF '{}': extracted {} chars ({} pages, {} bytes)",
            file_name,
            trimmed.len(),
            parsed.page_count,
            size
        );
        return ExtractedText::full(trimmed, SourceFormat::Pdf).with_page_count(parsed.page_count);
    }

    warn!(
        "PDF '{}' has no usable text layer ({} chars); falling back to metadata",
        file_name,
        trimmed.chars().count()
    );
    fallback_metadata(
        file_name,
        parsed.title.as_deref(),
        parsed.author.as_deref(),
        parsed.page_count,
    )
}

fn fallback_metadata(
    file_name: &str,
    title: Option<&str>,
    author: Option<&str>,
    page_count: usize,
) -> ExtractedText {
    let content = format!(
        "A PDF document was uploaded: {file_name}\n\
         Title: {title}\n\
         Author: {author}\n\
         Pages: {page_count}\n\n\
         No extractable text was found in this PDF. It is most likely a scanned or \
         image-only document.\n\n\
         {MANUAL_DESCRIPTION_HINT}",
        title = title.unwrap_or(UNTITLED),
        author = author.unwrap_or(UNKNOWN_AUTHOR),
    );
    ExtractedText {
        content,
        source_format: SourceFormat::Pdf,
        extraction_mode: ExtractionMode::FallbackMetadata,
        page_count: Some(page_count),
    }
}

fn fallback_error(file_name: &str, size: usize) -> ExtractedText {
    let content = format!(
        "A PDF document was uploaded: {file_name}\n\
         File size: {kb:.2} KB\n\n\
         Parsing the PDF failed. Possible reasons:\n\
         - the file is a scanned image PDF\n\
         - the file is password-protected or encrypted\n\
         - the file is damaged or truncated\n\n\
         {MANUAL_DESCRIPTION_HINT}",
        kb = size as f64 / 1024.0,
    );
    ExtractedText {
        content,
        source_format: SourceFormat::Pdf,
        extraction_mode: ExtractionMode::FallbackError,
        page_count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(bytes: Vec<u8>) -> UploadedDocument {
        UploadedDocument::new(bytes, "application/pdf", "report.pdf")
    }

    #[tokio::test]
    async fn short_input_falls_back_without_parsing() {
        for len in [0usize, 4, 50, 99] {
            let mut bytes = b"%PDF-1.7\n".to_vec();
            bytes.resize(len, b' ');
            let out = PdfExtractor::default().extract(upload(bytes)).await;
            assert_eq!(out.extraction_mode, ExtractionMode::FallbackError, "len {len}");
            assert!(!out.content.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_signature_falls_back() {
        let bytes = vec![b'A'; 4096];
        let out = PdfExtractor::default().extract(upload(bytes)).await;
        assert_eq!(out.extraction_mode, ExtractionMode::FallbackError);
        assert!(out.content.contains("report.pdf"));
        assert!(out.content.contains("4.00 KB"));
    }

    #[tokio::test]
    async fn unparseable_body_falls_back() {
        // Passes the header check; either pdfium is absent or it rejects the body.
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat_n(b'x', 300));
        let out = PdfExtractor::default().extract(upload(bytes)).await;
        assert_eq!(out.extraction_mode, ExtractionMode::FallbackError);
        assert_eq!(out.source_format, SourceFormat::Pdf);
    }

    #[test]
    fn header_check() {
        assert!(check_header(&[]).is_err());
        assert!(check_header(&[b'%'; 99]).is_err());
        let mut ok = b"%PDF".to_vec();
        ok.resize(MIN_PDF_BYTES, 0);
        assert!(check_header(&ok).is_ok());
    }

    #[test]
    fn text_layer_becomes_full_mode() {
        let parsed = ParsedPdf {
            text: "\n  Section 1. Payment terms apply.  \n".into(),
            title: None,
            author: None,
            page_count: 3,
        };
        let out = classify(parsed, "a.pdf", 2048);
        assert_eq!(out.extraction_mode, ExtractionMode::Full);
        assert_eq!(out.content, "Section 1. Payment terms apply.");
        assert_eq!(out.page_count, Some(3));
    }

    #[test]
    fn scanned_pdf_uses_metadata() {
        let parsed = ParsedPdf {
            text: " \n 12 \n".into(),
            title: Some("Lease Agreement".into()),
            author: None,
            page_count: 7,
        };
        let out = classify(parsed, "scan.pdf", 2048);
        assert_eq!(out.extraction_mode, ExtractionMode::FallbackMetadata);
        assert!(out.content.contains("scan.pdf"));
        assert!(out.content.contains("Lease Agreement"));
        assert!(out.content.contains(UNKNOWN_AUTHOR));
        assert!(out.content.contains("Pages: 7"));
        assert!(out.content.contains("changes field"));
    }

    #[test]
    fn ten_chars_is_enough() {
        let parsed = ParsedPdf {
            text: "0123456789".into(),
            title: None,
            author: None,
            page_count: 1,
        };
        assert_eq!(
            classify(parsed, "a.pdf", 200).extraction_mode,
            ExtractionMode::Full
        );
    }

    #[test]
    fn page_ceiling_is_at_least_one() {
        assert_eq!(PdfExtractor::new(0).max_pages(), 1);
        assert_eq!(PdfExtractor::default().max_pages(), DEFAULT_MAX_PAGES);
    }
}
