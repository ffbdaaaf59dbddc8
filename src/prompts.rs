//! Prompt configuration and template substitution.
//!
//! The persisted prompt record ([`PromptConfiguration`]) is edited by an
//! administrator at runtime, so nothing here is authoritative except the
//! fallback pair [`DEFAULT_SYSTEM_PROMPT`] / [`DEFAULT_MAIN_PROMPT`], used
//! when the record cannot be read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the extracted document text.
pub const ORIGINAL_DOC_PLACEHOLDER: &str = "{originalDoc}";

/// Placeholder replaced with the user's change description.
pub const CHANGES_PLACEHOLDER: &str = "{changes}";

/// Built-in system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert at analysing changes to documents. \
Compare the given original document with the requested changes and return an accurate diff \
result as JSON.";

/// Built-in main prompt template. Must contain both placeholders.
pub const DEFAULT_MAIN_PROMPT: &str = r#"Original document:
{originalDoc}

Requested changes:
{changes}

Analyse the content above and return the diff result as a single JSON object with this shape:

{
  "summary": "one or two sentences describing the overall change",
  "diffList": [
    {
      "section": "section title or number the change applies to",
      "original": "original text, or null if the text is newly added",
      "updated": "updated text, or null if the text is removed"
    }
  ]
}

Return only the JSON object."#;

/// The persisted prompt record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptConfiguration {
    pub system_prompt: String,
    #[serde(rename = "mainPrompt", alias = "mainPromptTemplate")]
    pub main_prompt_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl Default for PromptConfiguration {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            main_prompt_template: DEFAULT_MAIN_PROMPT.to_string(),
            last_updated: None,
        }
    }
}

impl PromptConfiguration {
    /// Placeholders absent from the main template.
    pub fn missing_placeholders(&self) -> Vec<&'static str> {
        [ORIGINAL_DOC_PLACEHOLDER, CHANGES_PLACEHOLDER]
            .into_iter()
            .filter(|p| !self.main_prompt_template.contains(p))
            .collect()
    }
}

/// Replace the first `{originalDoc}` and the first `{changes}` in `template`.
///
/// Only the first occurrence of each placeholder is replaced; later copies
/// are left verbatim. Positions are taken from the template itself, so a
/// document that happens to contain the text `{changes}` is not rewritten.
pub fn substitute_placeholders(template: &str, original_doc: &str, changes: &str) -> String {
    let mut slots: Vec<(usize, &str, &str)> = [
        (ORIGINAL_DOC_PLACEHOLDER, original_doc),
        (CHANGES_PLACEHOLDER, changes),
    ]
    .into_iter()
    .filter_map(|(token, value)| template.find(token).map(|at| (at, token, value)))
    .collect();
    slots.sort_by_key(|&(at, _, _)| at);

    let mut out = String::with_capacity(template.len() + original_doc.len() + changes.len());
    let mut cursor = 0;
    for (at, token, value) in slots {
        out.push_str(&template[cursor..at]);
        out.push_str(value);
        cursor = at + token.len();
    }
    out.push_str(&template[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_both_placeholders_once() {
        let template = "Doc: {originalDoc} | Changes: {changes} | end";
        assert_eq!(
            substitute_placeholders(template, "D", "C"),
            "Doc: D | Changes: C | end"
        );
    }

    #[test]
    fn order_in_template_does_not_matter() {
        let template = "{changes} before {originalDoc}";
        assert_eq!(substitute_placeholders(template, "D", "C"), "C before D");
    }

    #[test]
    fn only_first_occurrence_is_replaced() {
        let template = "{originalDoc} {changes} {originalDoc} {changes}";
        assert_eq!(
            substitute_placeholders(template, "D", "C"),
            "D C {originalDoc} {changes}"
        );
    }

    #[test]
    fn document_text_is_not_rescanned() {
        let template = "A {originalDoc} B {changes}";
        assert_eq!(
            substitute_placeholders(template, "literal {changes}", "C"),
            "A literal {changes} B C"
        );
    }

    #[test]
    fn missing_placeholder_leaves_template_intact() {
        assert_eq!(substitute_placeholders("no slots", "D", "C"), "no slots");
        assert_eq!(substitute_placeholders("{changes}", "D", "C"), "C");
    }

    #[test]
    fn default_prompts_are_complete() {
        let config = PromptConfiguration::default();
        assert!(config.missing_placeholders().is_empty());
        assert!(DEFAULT_MAIN_PROMPT.contains("diffList"));
    }

    #[test]
    fn reads_original_record_layout() {
        let json = r#"{
            "systemPrompt": "sys",
            "mainPrompt": "main {originalDoc} {changes}",
            "lastUpdated": "2025-06-01T09:30:00.000Z"
        }"#;
        let config: PromptConfiguration = serde_json::from_str(json).unwrap();
        assert_eq!(config.system_prompt, "sys");
        assert!(config.last_updated.is_some());

        let alias = r#"{"systemPrompt": "s", "mainPromptTemplate": "m"}"#;
        let config: PromptConfiguration = serde_json::from_str(alias).unwrap();
        assert_eq!(config.main_prompt_template, "m");
        assert_eq!(config.missing_placeholders().len(), 2);
    }
}
