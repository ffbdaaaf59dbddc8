//! Format detection from the declared media type and filename.
//!
//! Upload clients are unreliable about media types (browsers send
//! `application/octet-stream` for `.docx`, some Korean office suites send
//! `application/haansoftdocx`), so the extension is an equally trusted
//! signal: a document is accepted if *either* matches.

use crate::document::SourceFormat;

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Media types accepted as Word documents.
pub const WORD_MEDIA_TYPES: &[&str] = &[
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/msword",
    "application/haansoftdocx",
];

const PDF_EXTENSIONS: &[&str] = &[".pdf"];
const WORD_EXTENSIONS: &[&str] = &[".docx", ".doc"];

/// Result of format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Unsupported,
}

impl DocumentFormat {
    /// The extractable format, or `None` for [`DocumentFormat::Unsupported`].
    pub fn source_format(self) -> Option<SourceFormat> {
        match self {
            DocumentFormat::Pdf => Some(SourceFormat::Pdf),
            DocumentFormat::Docx => Some(SourceFormat::Docx),
            DocumentFormat::Unsupported => None,
        }
    }
}

/// Classify an upload. PDF wins when both PDF and Word signals are present.
pub fn detect_format(declared_media_type: &str, file_name: &str) -> DocumentFormat {
    let media_type = media_type_essence(declared_media_type);
    let name = file_name.trim().to_lowercase();

    if media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE) || has_extension(&name, PDF_EXTENSIONS) {
        return DocumentFormat::Pdf;
    }

    if WORD_MEDIA_TYPES
        .iter()
        .any(|m| media_type.eq_ignore_ascii_case(m))
        || has_extension(&name, WORD_EXTENSIONS)
    {
        return DocumentFormat::Docx;
    }

    DocumentFormat::Unsupported
}

/// Guess a media type from a filename; used by callers that have no
/// declared type (CLI, local files).
pub fn media_type_for_file_name(file_name: &str) -> &'static str {
    let name = file_name.to_lowercase();
    if name.ends_with(".pdf") {
        PDF_MEDIA_TYPE
    } else if name.ends_with(".docx") {
        WORD_MEDIA_TYPES[0]
    } else if name.ends_with(".doc") {
        WORD_MEDIA_TYPES[1]
    } else {
        "application/octet-stream"
    }
}

/// `"application/pdf; charset=binary"` → `"application/pdf"`.
fn media_type_essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or("").trim()
}

fn has_extension(lower_name: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| lower_name.ends_with(ext))
}
