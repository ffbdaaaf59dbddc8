//! LLM interaction: send the composed prompt, recover a [`DiffResult`].
//!
//! The request is a plain two-message chat completion. Everything
//! interesting happens on the way back: models wrap their JSON in prose
//! ("Here is the result: {...} Let me know...") or answer with something
//! that is not JSON at all, so the response goes through four checks, each
//! with its own error:
//!
//! 1. any text at all                   → [`DocDiffError::NoResponse`]
//! 2. a `{ … }` span (first `{` to last `}`) → [`DocDiffError::MalformedResponse`]
//! 3. that span parses as JSON          → [`DocDiffError::MalformedResponse`]
//! 4. `summary` / `diffList` shape      → [`DocDiffError::InvalidShape`]
//!
//! The span search is greedy: commentary around the payload is tolerated,
//! braces inside that commentary are not.
//!
//! There is exactly one attempt per request; failures are not retried.

use crate::error::DocDiffError;
use crate::output::{DiffItem, DiffResult};
use crate::pipeline::compose::ComposedPrompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Default sampling temperature: low, for repeatable diffs.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output ceiling.
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// Default deadline for a single completion.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 60;

static RE_JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// One chat-completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// The completion service, reduced to what the diff client needs.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Return the model's free-form text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DocDiffError>;
}

/// [`CompletionBackend`] over an `edgequake-llm` provider.
pub struct ProviderBackend {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderBackend {
    /// `label` is used in logs only (typically `provider/model`).
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl CompletionBackend for ProviderBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DocDiffError> {
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user(request.user_prompt.as_str()),
        ];
        let options = CompletionOptions {
            temperature: Some(request.temperature),
            max_tokens: Some(request.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| DocDiffError::LlmApiError {
                message: format!("{}", e),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Sends composed prompts and validates what comes back.
#[derive(Clone)]
pub struct DiffGenerationClient {
    backend: Arc<dyn CompletionBackend>,
    temperature: f32,
    max_tokens: usize,
    timeout: Duration,
}

impl DiffGenerationClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the request for a composed prompt.
    pub fn request_for(&self, prompt: &ComposedPrompt) -> CompletionRequest {
        CompletionRequest {
            system_prompt: prompt.system_prompt.clone(),
            user_prompt: prompt.user_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// One completion, bounded by the configured deadline, then validation.
    ///
    /// Dropping the returned future aborts the in-flight request.
    pub async fn generate(&self, prompt: &ComposedPrompt) -> Result<DiffResult, DocDiffError> {
        let request = self.request_for(prompt);
        let start = Instant::now();

        let content = timeout(self.timeout, self.backend.complete(&request))
            .await
            .map_err(|_| {
                warn!("LLM call exceeded {:?}", self.timeout);
                DocDiffError::ApiTimeout {
                    secs: self.timeout.as_secs().max(1),
                }
            })??;

        info!(
            "LLM responded with {} chars in {}ms",
            content.len(),
            start.elapsed().as_millis()
        );

        parse_diff_response(&content).inspect_err(|e| {
            warn!("Rejected LLM response: {}", e);
            debug!("Raw response: {}", content);
        })
    }
}

/// Locate, parse and validate the JSON payload in a completion.
pub fn parse_diff_response(content: &str) -> Result<DiffResult, DocDiffError> {
    if content.trim().is_empty() {
        return Err(DocDiffError::NoResponse);
    }

    let span = RE_JSON_SPAN
        .find(content)
        .ok_or_else(|| DocDiffError::MalformedResponse {
            detail: "no JSON object found in the response".into(),
        })?;

    let value: Value =
        serde_json::from_str(span.as_str()).map_err(|e| DocDiffError::MalformedResponse {
            detail: e.to_string(),
        })?;

    validate_shape(value)
}

fn validate_shape(value: Value) -> Result<DiffResult, DocDiffError> {
    let Value::Object(mut root) = value else {
        return Err(DocDiffError::InvalidShape {
            detail: "top-level value is not an object".into(),
        });
    };

    let summary = match root.remove("summary") {
        Some(Value::String(s)) if !s.is_empty() => s,
        Some(Value::String(_)) => {
            return Err(DocDiffError::InvalidShape {
                detail: "`summary` is empty".into(),
            })
        }
        Some(other) => {
            return Err(DocDiffError::InvalidShape {
                detail: format!("`summary` is not a string: {other}"),
            })
        }
        None => {
            return Err(DocDiffError::InvalidShape {
                detail: "`summary` is missing".into(),
            })
        }
    };

    let items = match root.remove("diffList") {
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(DocDiffError::InvalidShape {
                detail: "`diffList` is not an array".into(),
            })
        }
        None => {
            return Err(DocDiffError::InvalidShape {
                detail: "`diffList` is missing".into(),
            })
        }
    };

    let diff_list = items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            if !item.is_object() {
                return Err(DocDiffError::InvalidShape {
                    detail: format!("diffList[{i}] is not an object"),
                });
            }
            serde_json::from_value::<DiffItem>(item).map_err(|e| DocDiffError::InvalidShape {
                detail: format!("diffList[{i}]: {e}"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let noops = diff_list.iter().filter(|d| d.is_noop()).count();
    if noops > 0 {
        debug!("{} diff item(s) have neither original nor updated text", noops);
    }

    Ok(DiffResult { summary, diff_list })
}
