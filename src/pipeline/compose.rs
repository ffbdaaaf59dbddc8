//! Prompt composition: fresh prompt record + extracted text + changes.

use crate::prompt_store::ConfigurationSource;
use crate::prompts::{substitute_placeholders, PromptConfiguration};
use std::sync::Arc;
use tracing::{debug, warn};

/// The two messages sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Reads the prompt record through its source and fills the template.
#[derive(Clone)]
pub struct PromptComposer {
    source: Arc<dyn ConfigurationSource>,
}

impl PromptComposer {
    pub fn new(source: Arc<dyn ConfigurationSource>) -> Self {
        Self { source }
    }

    /// Current prompt record, or the built-in defaults if it cannot be read.
    pub async fn load(&self) -> PromptConfiguration {
        match self.source.read().await {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using built-in default prompts", e);
                PromptConfiguration::default()
            }
        }
    }

    /// Load the record and substitute `original_doc` / `changes` into it.
    pub async fn compose(&self, original_doc: &str, changes: &str) -> ComposedPrompt {
        let config = self.load().await;

        let missing = config.missing_placeholders();
        if !missing.is_empty() {
            warn!("Main prompt template has no {:?} placeholder(s)", missing);
        }

        let user_prompt =
            substitute_placeholders(&config.main_prompt_template, original_doc, changes);
        debug!(
            "Composed prompt: {} system chars, {} user chars",
            config.system_prompt.len(),
            user_prompt.len()
        );

        ComposedPrompt {
            system_prompt: config.system_prompt,
            user_prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocDiffError;
    use crate::prompt_store::{JsonPromptStore, StaticPromptSource};
    use crate::prompts::{DEFAULT_MAIN_PROMPT, DEFAULT_SYSTEM_PROMPT};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl ConfigurationSource for CountingSource {
        async fn read(&self) -> Result<PromptConfiguration, DocDiffError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(PromptConfiguration {
                system_prompt: format!("system v{n}"),
                main_prompt_template: "{originalDoc}/{changes}".into(),
                last_updated: None,
            })
        }
    }

    #[tokio::test]
    async fn composes_from_source() {
        let composer = PromptComposer::new(Arc::new(StaticPromptSource::new(PromptConfiguration {
            system_prompt: "sys".into(),
            main_prompt_template: "[{originalDoc}] -> [{changes}]".into(),
            last_updated: None,
        })));
        let prompt = composer.compose("D", "C").await;
        assert_eq!(prompt.system_prompt, "sys");
        assert_eq!(prompt.user_prompt, "[D] -> [C]");
    }

    #[tokio::test]
    async fn unreadable_store_falls_back_to_defaults() {
        let composer =
            PromptComposer::new(Arc::new(JsonPromptStore::new("/no/such/dir/prompt.json")));
        let prompt = composer.compose("DOC", "CHG").await;
        assert_eq!(prompt.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(prompt.user_prompt.contains("DOC"));
        assert!(prompt.user_prompt.contains("CHG"));
        assert_ne!(prompt.user_prompt, DEFAULT_MAIN_PROMPT);
    }

    #[tokio::test]
    async fn reads_fresh_every_time() {
        let source = Arc::new(CountingSource {
            reads: AtomicUsize::new(0),
        });
        let composer = PromptComposer::new(source.clone());
        assert_eq!(composer.compose("a", "b").await.system_prompt, "system v1");
        assert_eq!(composer.compose("a", "b").await.system_prompt, "system v2");
        assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    }
}
