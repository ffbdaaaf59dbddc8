//! Configuration for the document-diff pipeline.
//!
//! Every knob lives in [`DiffConfig`], built through [`DiffConfigBuilder`].
//! Callers set only what they care about; everything else has a default
//! matching the production deployment (temperature 0.3, 4000 output tokens,
//! 60 s deadline).

use crate::error::DocDiffError;
use crate::pipeline::llm::{
    CompletionBackend, DEFAULT_API_TIMEOUT_SECS, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
use crate::pipeline::pdf::DEFAULT_MAX_PAGES;
use crate::progress::ProgressCallback;
use crate::prompt_store::ConfigurationSource;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Configuration for one or many diff requests.
///
/// # Example
/// ```rust
/// use edgequake_docdiff::DiffConfig;
///
/// let config = DiffConfig::builder()
///     .model("gpt-4.1")
///     .temperature(0.2)
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 4000);
/// ```
#[derive(Clone)]
pub struct DiffConfig {
    /// LLM model identifier. Default: [`DEFAULT_MODEL`] when a provider is
    /// resolved by name.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Completion backend. Takes precedence over every provider setting.
    pub backend: Option<Arc<dyn CompletionBackend>>,

    /// Where prompts are read from. Takes precedence over `prompt_file`.
    pub prompt_source: Option<Arc<dyn ConfigurationSource>>,

    /// Path of the JSON prompt record.
    pub prompt_file: Option<PathBuf>,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.3.
    pub temperature: f32,

    /// Output token ceiling. Default: 4000.
    ///
    /// A long document with many edits produces a long `diffList`; a ceiling
    /// that is too low truncates the JSON and the response is rejected as
    /// malformed.
    pub max_tokens: usize,

    /// Deadline for the LLM call, in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Upper bound on PDF pages read for text. Default: 50.
    pub max_pdf_pages: usize,

    /// Directory or file of the pdfium shared library. Default: system lookup.
    pub pdfium_library_path: Option<PathBuf>,

    /// Per-stage observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            prompt_source: None,
            prompt_file: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            max_pdf_pages: DEFAULT_MAX_PAGES,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DiffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|_| "<dyn CompletionBackend>"))
            .field(
                "prompt_source",
                &self.prompt_source.as_ref().map(|_| "<dyn ConfigurationSource>"),
            )
            .field("prompt_file", &self.prompt_file)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_pdf_pages", &self.max_pdf_pages)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .finish()
    }
}

impl DiffConfig {
    /// Create a new builder for `DiffConfig`.
    pub fn builder() -> DiffConfigBuilder {
        DiffConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DiffConfig`].
#[derive(Debug)]
pub struct DiffConfigBuilder {
    config: DiffConfig,
}

impl DiffConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn CompletionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn prompt_source(mut self, source: Arc<dyn ConfigurationSource>) -> Self {
        self.config.prompt_source = Some(source);
        self
    }

    pub fn prompt_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.prompt_file = Some(path.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_pdf_pages(mut self, n: usize) -> Self {
        self.config.max_pdf_pages = n;
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DiffConfig, DocDiffError> {
        let c = &self.config;
        if !c.temperature.is_finite() {
            return Err(DocDiffError::InvalidConfig(
                "temperature must be a finite number".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(DocDiffError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocDiffError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.max_pdf_pages == 0 {
            return Err(DocDiffError::InvalidConfig(
                "max_pdf_pages must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
