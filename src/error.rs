//! Error types for the edgequake-docdiff library.
//!
//! A single fatal error type, [`DocDiffError`], covers every way a diff
//! request can terminate. Variants are grouped by the pipeline stage that
//! raises them, and [`DocDiffError::stage`] / [`DocDiffError::status_code`]
//! let a boundary layer (HTTP handler, CLI) report *which* stage failed and
//! whether the caller or the server is at fault.
//!
//! Two failure classes never show up here:
//!
//! * PDF extraction problems are recovered inside the PDF extractor as
//!   fallback text (see [`crate::document::ExtractionMode`]).
//! * [`DocDiffError::ConfigurationUnavailable`] is produced by the prompt
//!   store but swallowed by the prompt composer, which falls back to the
//!   built-in prompts. It only reaches callers that use the store directly.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docdiff library.
#[derive(Debug, Error)]
pub enum DocDiffError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither the media type nor the file extension names a PDF or Word document.
    #[error("Unsupported file format for '{file_name}' (media type: '{media_type}')\nOnly PDF and Word documents (.pdf, .doc, .docx) are accepted.")]
    UnsupportedFormat {
        file_name: String,
        media_type: String,
    },

    /// The change description was empty.
    #[error("No changes were provided.\nDescribe the intended changes to the document.")]
    MissingChanges,

    /// A local input file could not be read.
    #[error("Failed to read '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// A Word document yielded no text or could not be parsed.
    #[error("Document extraction failed for '{file_name}': {detail}")]
    DocumentExtraction { file_name: String, detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The model answered with no textual content at all.
    #[error("Diff generation failed: the LLM returned no content")]
    NoResponse,

    /// No JSON object could be located in, or parsed from, the completion.
    #[error("Diff generation failed: the LLM response is not valid JSON: {detail}")]
    MalformedResponse { detail: String },

    /// The JSON parsed, but `summary` / `diffList` have the wrong shape.
    #[error("Diff generation failed: unexpected response shape: {detail}")]
    InvalidShape { detail: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("Diff generation failed: LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("Diff generation failed: LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call exceeded the configured deadline.
    #[error("Diff generation failed: LLM call timed out after {secs}s")]
    ApiTimeout { secs: u64 },

    // ── Prompt configuration errors ───────────────────────────────────────
    /// The persisted prompt record is missing or unreadable.
    #[error("Prompt configuration unavailable at '{path}': {detail}")]
    ConfigurationUnavailable { path: PathBuf, detail: String },

    /// A prompt update was rejected.
    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    /// The prompt record could not be written.
    #[error("Failed to write prompt configuration '{path}': {source}")]
    PromptStoreWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// The pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    Input,
    Extraction,
    Generation,
    Configuration,
    Internal,
}

impl DocDiffError {
    /// Which stage of the pipeline raised this error.
    pub fn stage(&self) -> ErrorStage {
        match self {
            Self::UnsupportedFormat { .. } | Self::MissingChanges | Self::FileReadFailed { .. } => {
                ErrorStage::Input
            }
            Self::DocumentExtraction { .. } => ErrorStage::Extraction,
            Self::NoResponse
            | Self::MalformedResponse { .. }
            | Self::InvalidShape { .. }
            | Self::ProviderNotConfigured { .. }
            | Self::LlmApiError { .. }
            | Self::ApiTimeout { .. } => ErrorStage::Generation,
            Self::ConfigurationUnavailable { .. }
            | Self::InvalidPrompt(_)
            | Self::PromptStoreWriteFailed { .. }
            | Self::InvalidConfig(_) => ErrorStage::Configuration,
            Self::Internal(_) => ErrorStage::Internal,
        }
    }

    /// HTTP-style status code for the boundary layer.
    ///
    /// Bad input and unreadable documents are the caller's problem (400);
    /// everything from the LLM onward is ours (500).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnsupportedFormat { .. }
            | Self::MissingChanges
            | Self::FileReadFailed { .. }
            | Self::DocumentExtraction { .. }
            | Self::InvalidPrompt(_) => 400,
            _ => 500,
        }
    }

    /// `true` when the caller sent something we cannot process.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
