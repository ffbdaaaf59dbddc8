//! Input-side data model: the uploaded document and the text recovered from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single uploaded file, exactly as the boundary layer received it.
///
/// Owned by one pipeline invocation and consumed by extraction.
#[derive(Clone)]
pub struct UploadedDocument {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// Media type declared by the client; frequently wrong or empty.
    pub declared_media_type: String,
    /// Original filename, used for extension sniffing and diagnostics.
    pub file_name: String,
}

impl UploadedDocument {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        declared_media_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            declared_media_type: declared_media_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("declared_media_type", &self.declared_media_type)
            .field("file_name", &self.file_name)
            .finish()
    }
}

/// Container format the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Pdf => f.write_str("PDF"),
            SourceFormat::Docx => f.write_str("Word"),
        }
    }
}

/// Quality tier of the recovered text.
///
/// | Mode | Meaning |
/// |------|---------|
/// | `Full` | Real document text |
/// | `FallbackMetadata` | PDF parsed but had no text layer; content describes the file |
/// | `FallbackError` | PDF could not be parsed; content describes the failure |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    Full,
    FallbackMetadata,
    FallbackError,
}

impl ExtractionMode {
    pub fn is_fallback(self) -> bool {
        !matches!(self, ExtractionMode::Full)
    }
}

/// Text recovered from an [`UploadedDocument`].
///
/// `content` is never empty: fallback modes carry a synthetic explanation
/// so downstream stages always have something to put in the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub content: String,
    pub source_format: SourceFormat,
    pub extraction_mode: ExtractionMode,
    /// Total page count, when the extractor knows it (PDF only).
    pub page_count: Option<usize>,
}

impl ExtractedText {
    pub fn full(content: impl Into<String>, source_format: SourceFormat) -> Self {
        Self {
            content: content.into(),
            source_format,
            extraction_mode: ExtractionMode::Full,
            page_count: None,
        }
    }

    pub fn with_page_count(mut self, pages: usize) -> Self {
        self.page_count = Some(pages);
        self
    }

    /// Apply [`crate::pipeline::normalize::normalize_text`] to the content.
    pub fn normalized(mut self) -> Self {
        self.content = crate::pipeline::normalize::normalize_text(&self.content);
        self
    }
}
