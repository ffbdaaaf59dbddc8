//! Format-polymorphic extraction.
//!
//! The PDF and Word extractors share nothing beyond "bytes in, text out",
//! and their failure policies differ on purpose (PDF degrades, Word fails).
//! A tagged union keeps that dispatch explicit at the single call site.

use crate::config::DiffConfig;
use crate::document::{ExtractedText, SourceFormat, UploadedDocument};
use crate::error::DocDiffError;
use crate::pipeline::pdf::PdfExtractor;
use crate::pipeline::word::WordExtractor;

#[derive(Debug, Clone)]
pub enum TextExtractor {
    Pdf(PdfExtractor),
    Word(WordExtractor),
}

impl TextExtractor {
    /// Pick the extractor for a detected format, configured from `config`.
    pub fn for_format(format: SourceFormat, config: &DiffConfig) -> Self {
        match format {
            SourceFormat::Pdf => {
                let mut pdf = PdfExtractor::new(config.max_pdf_pages);
                if let Some(ref path) = config.pdfium_library_path {
                    pdf = pdf.with_library_path(path.clone());
                }
                TextExtractor::Pdf(pdf)
            }
            SourceFormat::Docx => TextExtractor::Word(WordExtractor::new()),
        }
    }

    pub fn source_format(&self) -> SourceFormat {
        match self {
            TextExtractor::Pdf(_) => SourceFormat::Pdf,
            TextExtractor::Word(_) => SourceFormat::Docx,
        }
    }

    /// Run the extractor. Only the Word variant can return `Err`.
    pub async fn extract(&self, document: UploadedDocument) -> Result<ExtractedText, DocDiffError> {
        match self {
            TextExtractor::Pdf(pdf) => Ok(pdf.extract(document).await),
            TextExtractor::Word(word) => word.extract(document).await,
        }
    }
}
