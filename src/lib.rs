//! # edgequake-docdiff
//!
//! Describe the changes you want made to a PDF or Word document, and get back
//! a structured, section-by-section diff produced by an LLM.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload + change description
//!  │
//!  ├─ 1. Detect     PDF / Word / unsupported, from media type or extension
//!  ├─ 2. Extract    pdfium (PDF, degrades to a description) or
//!  │                OOXML / legacy .doc parsing (Word, fails hard)
//!  ├─ 3. Normalize  collapse whitespace, keep paragraph breaks
//!  ├─ 4. Compose    fill the persisted prompt template
//!  ├─ 5. Generate   one chat completion (gpt-4.1 / claude / gemini / …)
//!  └─ 6. Validate   locate the JSON, check summary + diffList
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docdiff::{process_file, DiffConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = DiffConfig::default();
//!     let diff = process_file("contract.docx", "Extend the term to 24 months", &config).await?;
//!     println!("{}", diff.summary);
//!     for item in &diff.diff_list {
//!         println!("[{}] {:?} -> {:?}", item.section, item.original, item.updated);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Prompts
//!
//! The system prompt and the main template live in a JSON record
//! (`prompts/system_prompt.json` by default, see [`JsonPromptStore`]) that is
//! re-read on every request. If it is missing or broken the built-in prompts
//! in [`prompts`] are used.
//!
//! ## Errors
//!
//! Every fatal error is a [`DocDiffError`]; [`DocDiffError::status_code`]
//! maps it to 400 (bad input) or 500 (LLM or server failure).
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docdiff` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docdiff = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompt_store;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DiffConfig, DiffConfigBuilder};
pub use document::{ExtractedText, ExtractionMode, SourceFormat, UploadedDocument};
pub use error::{DocDiffError, ErrorStage};
pub use output::{DiffItem, DiffResult};
pub use pipeline::detect::{detect_format, DocumentFormat};
pub use pipeline::llm::{
    parse_diff_response, CompletionBackend, CompletionRequest, DiffGenerationClient,
    ProviderBackend,
};
pub use pipeline::normalize::normalize_text;
pub use process::{
    extract_document, load_document, process_document, process_document_sync, process_file,
};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, PipelineStage, ProgressCallback};
pub use prompt_store::{ConfigurationSource, JsonPromptStore, StaticPromptSource};
pub use prompts::PromptConfiguration;
