//! The persisted prompt record.
//!
//! The diff pipeline depends only on [`ConfigurationSource::read`], called
//! once per request with no caching, so an administrator's edit takes effect
//! on the very next request. Writing is a separate inherent method on
//! [`JsonPromptStore`]; the diff path never holds anything that can write.

use crate::error::DocDiffError;
use crate::prompts::PromptConfiguration;
use async_trait::async_trait;
use chrono::Utc;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default location of the prompt record, relative to the working directory.
pub const DEFAULT_PROMPT_FILE: &str = "prompts/system_prompt.json";

/// Environment variable overriding [`DEFAULT_PROMPT_FILE`].
pub const PROMPT_FILE_ENV: &str = "DOCDIFF_PROMPT_FILE";

/// Read access to the prompt configuration.
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Fetch the current record. Called fresh on every request.
    async fn read(&self) -> Result<PromptConfiguration, DocDiffError>;
}

/// JSON file holding `{systemPrompt, mainPrompt, lastUpdated}`.
#[derive(Debug, Clone)]
pub struct JsonPromptStore {
    path: PathBuf,
}

impl JsonPromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$DOCDIFF_PROMPT_FILE`, or [`DEFAULT_PROMPT_FILE`].
    pub fn from_env() -> Self {
        match std::env::var(PROMPT_FILE_ENV) {
            Ok(p) if !p.trim().is_empty() => Self::new(p),
            _ => Self::new(DEFAULT_PROMPT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the record. Both prompts are trimmed and must be non-empty.
    ///
    /// Written atomically (unique temp file + rename) so a concurrent `read`
    /// sees either the old record or the new one, never a torn file, and
    /// concurrent writers never share a temp file.
    pub async fn write(
        &self,
        system_prompt: &str,
        main_prompt: &str,
    ) -> Result<PromptConfiguration, DocDiffError> {
        let system_prompt = system_prompt.trim();
        let main_prompt = main_prompt.trim();
        if system_prompt.is_empty() {
            return Err(DocDiffError::InvalidPrompt(
                "system prompt must not be empty".into(),
            ));
        }
        if main_prompt.is_empty() {
            return Err(DocDiffError::InvalidPrompt(
                "main prompt must not be empty".into(),
            ));
        }

        let record = PromptConfiguration {
            system_prompt: system_prompt.to_string(),
            main_prompt_template: main_prompt.to_string(),
            last_updated: Some(Utc::now()),
        };
        let missing = record.missing_placeholders();
        if !missing.is_empty() {
            warn!(
                "Main prompt is missing placeholder(s) {:?}; they will not be substituted",
                missing
            );
        }

        let json = serde_json::to_string_pretty(&record)
            .map_err(|e| DocDiffError::Internal(format!("serialise prompt record: {e}")))?;

        let write_err = |source| DocDiffError::PromptStoreWriteFailed {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;

        // Each writer gets its own temp file in the target directory.
        let target = self.path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(json.as_bytes())?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| DocDiffError::Internal(format!("prompt write task failed: {e}")))?
        .map_err(write_err)?;

        info!("Prompt configuration updated: {}", self.path.display());
        Ok(record)
    }
}

#[async_trait]
impl ConfigurationSource for JsonPromptStore {
    async fn read(&self) -> Result<PromptConfiguration, DocDiffError> {
        let unavailable = |detail: String| DocDiffError::ConfigurationUnavailable {
            path: self.path.clone(),
            detail,
        };

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let record: PromptConfiguration =
            serde_json::from_str(&raw).map_err(|e| unavailable(format!("invalid JSON: {e}")))?;

        if record.system_prompt.trim().is_empty() || record.main_prompt_template.trim().is_empty() {
            return Err(unavailable("prompt record has an empty prompt".into()));
        }

        debug!(
            "Loaded prompt configuration from {} (last updated: {:?})",
            self.path.display(),
            record.last_updated
        );
        Ok(record)
    }
}

/// A fixed in-memory record. Useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPromptSource {
    config: PromptConfiguration,
}

impl StaticPromptSource {
    pub fn new(config: PromptConfiguration) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigurationSource for StaticPromptSource {
    async fn read(&self) -> Result<PromptConfiguration, DocDiffError> {
        Ok(self.config.clone())
    }
}
