//! Pipeline entry points.
//!
//! [`process_document`] runs one diff request end to end:
//!
//! ```text
//! detect + validate changes ─▶ extract ─▶ normalize ─▶ compose prompt
//!        ─▶ resolve backend + generate diff ─▶ DiffResult
//! ```
//!
//! Unsupported formats and empty change descriptions are rejected before any
//! parsing work. The LLM backend is resolved only once a prompt exists, so
//! extraction errors keep their own category. Each request is independent;
//! dropping the returned future cancels whatever stage is in flight,
//! including the outbound LLM call.

use crate::config::{DiffConfig, DEFAULT_MODEL};
use crate::document::{ExtractedText, SourceFormat, UploadedDocument};
use crate::error::DocDiffError;
use crate::output::DiffResult;
use crate::pipeline::compose::PromptComposer;
use crate::pipeline::detect::{detect_format, media_type_for_file_name};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::llm::{CompletionBackend, DiffGenerationClient, ProviderBackend};
use crate::progress::{PipelineStage, ProgressCallback};
use crate::prompt_store::{ConfigurationSource, JsonPromptStore};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Turn an uploaded document and a change description into a [`DiffResult`].
///
/// # Errors
/// - [`DocDiffError::UnsupportedFormat`] / [`DocDiffError::MissingChanges`]
///   for bad input (400)
/// - [`DocDiffError::DocumentExtraction`] when a Word document yields no
///   text (400)
/// - generation errors when the LLM fails or answers badly (500)
///
/// PDF parsing problems are not errors: the request continues with a
/// synthetic description of the file.
pub async fn process_document(
    document: UploadedDocument,
    changes: &str,
    config: &DiffConfig,
) -> Result<DiffResult, DocDiffError> {
    let total_start = Instant::now();
    let stages = StageReporter::new(config.progress_callback.as_ref());
    info!(
        "Starting diff: '{}' ({} bytes, declared '{}')",
        document.file_name,
        document.len(),
        document.declared_media_type
    );

    // ── Step 1: Detect format and validate request ───────────────────────
    let started = stages.start(PipelineStage::Detect);
    let format = detect(&document).map_err(|e| stages.fail(PipelineStage::Detect, e))?;
    if changes.trim().is_empty() {
        return Err(stages.fail(PipelineStage::Detect, DocDiffError::MissingChanges));
    }
    stages.complete(PipelineStage::Detect, started);

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let started = stages.start(PipelineStage::Extract);
    let extracted = TextExtractor::for_format(format, config)
        .extract(document)
        .await
        .map_err(|e| stages.fail(PipelineStage::Extract, e))?;
    if extracted.extraction_mode.is_fallback() {
        warn!(
            "{} extraction degraded to {:?}",
            extracted.source_format, extracted.extraction_mode
        );
        stages.fallback(&extracted);
    }
    let extract_ms = stages.complete(PipelineStage::Extract, started);

    // ── Step 3: Normalize ────────────────────────────────────────────────
    let started = stages.start(PipelineStage::Normalize);
    let extracted = extracted.normalized();
    stages.complete(PipelineStage::Normalize, started);

    // ── Step 4: Compose prompt ───────────────────────────────────────────
    let started = stages.start(PipelineStage::Compose);
    let composer = PromptComposer::new(resolve_prompt_source(config));
    let prompt = composer.compose(&extracted.content, changes).await;
    stages.complete(PipelineStage::Compose, started);

    // ── Step 5: Generate diff ────────────────────────────────────────────
    let started = stages.start(PipelineStage::Generate);
    let backend = resolve_backend(config).map_err(|e| stages.fail(PipelineStage::Generate, e))?;
    let client = DiffGenerationClient::new(backend)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_timeout(Duration::from_secs(config.api_timeout_secs));
    let result = client
        .generate(&prompt)
        .await
        .map_err(|e| stages.fail(PipelineStage::Generate, e))?;
    let generate_ms = stages.complete(PipelineStage::Generate, started);

    info!(
        "Diff complete: {} item(s) from {} chars of {} text (extract {}ms, LLM {}ms, total {}ms)",
        result.len(),
        extracted.content.len(),
        extracted.source_format,
        extract_ms,
        generate_ms,
        total_start.elapsed().as_millis()
    );
    Ok(result)
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_document_sync(
    document: UploadedDocument,
    changes: &str,
    config: &DiffConfig,
) -> Result<DiffResult, DocDiffError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocDiffError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_document(document, changes, config))
}

/// Read a local file into an [`UploadedDocument`].
///
/// Without an explicit `media_type`, one is inferred from the extension
/// (`application/octet-stream` when the extension is unknown).
pub async fn load_document(
    path: impl AsRef<Path>,
    media_type: Option<&str>,
) -> Result<UploadedDocument, DocDiffError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DocDiffError::FileReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let media_type = media_type
        .map(str::to_string)
        .unwrap_or_else(|| media_type_for_file_name(&file_name).to_string());
    debug!("Loaded {} ({} bytes, '{}')", path.display(), bytes.len(), media_type);
    Ok(UploadedDocument::new(bytes, media_type, file_name))
}

/// [`process_document`] for a local file, media type inferred from its name.
pub async fn process_file(
    path: impl AsRef<Path>,
    changes: &str,
    config: &DiffConfig,
) -> Result<DiffResult, DocDiffError> {
    let document = load_document(path, None).await?;
    process_document(document, changes, config).await
}

/// Detect, extract and normalize without calling the LLM.
///
/// Does not require an LLM provider or API key.
pub async fn extract_document(
    document: UploadedDocument,
    config: &DiffConfig,
) -> Result<ExtractedText, DocDiffError> {
    let format = detect(&document)?;
    let extracted = TextExtractor::for_format(format, config)
        .extract(document)
        .await?;
    Ok(extracted.normalized())
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn detect(document: &UploadedDocument) -> Result<SourceFormat, DocDiffError> {
    let format = detect_format(&document.declared_media_type, &document.file_name);
    debug!("Detected {:?} for '{}'", format, document.file_name);
    format
        .source_format()
        .ok_or_else(|| DocDiffError::UnsupportedFormat {
            file_name: document.file_name.clone(),
            media_type: document.declared_media_type.clone(),
        })
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocDiffError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocDiffError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the completion backend, from most-specific to least-specific:
///
/// 1. `config.backend`, used as-is
/// 2. `config.provider`, wrapped in a [`ProviderBackend`]
/// 3. `config.provider_name` + `config.model` (default [`DEFAULT_MODEL`])
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 5. OpenAI, when `OPENAI_API_KEY` is set
/// 6. [`ProviderFactory::from_env`] auto-detection
fn resolve_backend(config: &DiffConfig) -> Result<Arc<dyn CompletionBackend>, DocDiffError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    let (provider, label) = resolve_provider(config)?;
    debug!("Using LLM provider {}", label);
    Ok(Arc::new(ProviderBackend::new(provider, label)))
}

fn resolve_provider(config: &DiffConfig) -> Result<(Arc<dyn LLMProvider>, String), DocDiffError> {
    if let Some(ref provider) = config.provider {
        return Ok((Arc::clone(provider), "custom".to_string()));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(ref name) = config.provider_name {
        return Ok((create_provider(name, model)?, format!("{name}/{model}")));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return Ok((
                create_provider(&prov, &env_model)?,
                format!("{prov}/{env_model}"),
            ));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok((create_provider("openai", model)?, format!("openai/{model}")));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocDiffError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok((llm_provider, "auto".to_string()))
}

/// `config.prompt_source`, else a JSON store at `config.prompt_file`, else
/// [`JsonPromptStore::from_env`].
fn resolve_prompt_source(config: &DiffConfig) -> Arc<dyn ConfigurationSource> {
    if let Some(ref source) = config.prompt_source {
        return Arc::clone(source);
    }
    match config.prompt_file {
        Some(ref path) => Arc::new(JsonPromptStore::new(path)),
        None => Arc::new(JsonPromptStore::from_env()),
    }
}

/// Forwards stage events to the optional progress callback.
struct StageReporter<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl<'a> StageReporter<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self { callback }
    }

    fn start(&self, stage: PipelineStage) -> Instant {
        if let Some(cb) = self.callback {
            cb.on_stage_start(stage);
        }
        Instant::now()
    }

    fn complete(&self, stage: PipelineStage, started: Instant) -> u64 {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        debug!("{} took {}ms", stage, elapsed_ms);
        if let Some(cb) = self.callback {
            cb.on_stage_complete(stage, elapsed_ms);
        }
        elapsed_ms
    }

    fn fallback(&self, extracted: &ExtractedText) {
        if let Some(cb) = self.callback {
            cb.on_fallback(extracted.extraction_mode);
        }
    }

    fn fail(&self, stage: PipelineStage, error: DocDiffError) -> DocDiffError {
        if let Some(cb) = self.callback {
            cb.on_stage_error(stage, &error.to_string());
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt_store::StaticPromptSource;

    #[test]
    fn detect_rejects_unknown_types() {
        let doc = UploadedDocument::new(b"hello".to_vec(), "text/plain", "notes.txt");
        let err = detect(&doc).unwrap_err();
        assert!(matches!(err, DocDiffError::UnsupportedFormat { .. }));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn explicit_backend_wins() {
        struct Never;
        #[async_trait::async_trait]
        impl CompletionBackend for Never {
            async fn complete(
                &self,
                _request: &crate::pipeline::llm::CompletionRequest,
            ) -> Result<String, DocDiffError> {
                Err(DocDiffError::NoResponse)
            }
        }
        let backend: Arc<dyn CompletionBackend> = Arc::new(Never);
        let config = DiffConfig::builder()
            .backend(Arc::clone(&backend))
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        let resolved = resolve_backend(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &backend));
    }

    #[test]
    fn prompt_source_precedence() {
        let source: Arc<dyn ConfigurationSource> = Arc::new(StaticPromptSource::default());
        let config = DiffConfig::builder()
            .prompt_source(Arc::clone(&source))
            .prompt_file("/ignored.json")
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(&resolve_prompt_source(&config), &source));
    }

    #[tokio::test]
    async fn load_document_infers_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let doc = load_document(&path, None).await.unwrap();
        assert_eq!(doc.file_name, "contract.pdf");
        assert_eq!(doc.declared_media_type, "application/pdf");

        let doc = load_document(&path, Some("application/octet-stream"))
            .await
            .unwrap();
        assert_eq!(doc.declared_media_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn load_document_missing_file() {
        let err = load_document("/no/such/file.docx", None).await.unwrap_err();
        assert!(matches!(err, DocDiffError::FileReadFailed { .. }));
    }
}
