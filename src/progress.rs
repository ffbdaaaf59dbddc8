//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::DiffConfigBuilder::progress_callback`] to hear about each
//! stage as a request moves through detection, extraction, composition and
//! generation. The CLI uses it to drive its spinner.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docdiff::{DiffConfig, PipelineProgressCallback, PipelineStage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: PipelineStage) {
//!         eprintln!("{}...", stage);
//!     }
//! }
//!
//! let config = DiffConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::document::ExtractionMode;
use std::fmt;
use std::sync::Arc;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Detect,
    Extract,
    Normalize,
    Compose,
    Generate,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStage::Detect => "Detecting format",
            PipelineStage::Extract => "Extracting text",
            PipelineStage::Normalize => "Normalising text",
            PipelineStage::Compose => "Composing prompt",
            PipelineStage::Generate => "Generating diff",
        };
        f.write_str(label)
    }
}

/// Called by the pipeline as it moves through its stages.
///
/// All methods default to no-ops. Stages of one request are sequential, but
/// a shared callback may see concurrent requests.
pub trait PipelineProgressCallback: Send + Sync {
    fn on_stage_start(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// `elapsed_ms` is wall-clock time spent in the stage.
    fn on_stage_complete(&self, stage: PipelineStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// PDF extraction degraded to a synthetic description.
    fn on_fallback(&self, mode: ExtractionMode) {
        let _ = mode;
    }

    /// The request failed in `stage`.
    fn on_stage_error(&self, stage: PipelineStage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation. The default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DiffConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
