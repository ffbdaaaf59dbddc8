//! Output types: the diff the model produced for one request.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One section-level change.
///
/// `original: None` is a pure addition, `updated: None` a pure deletion.
/// Items with both sides `None` are accepted as-is; see
/// [`DiffItem::is_noop`].
///
/// Decoding is lenient: numbers and booleans become their text, a null or
/// missing `section` becomes `""`, and null sides stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    #[serde(default, deserialize_with = "section_text")]
    pub section: String,
    #[serde(default, deserialize_with = "optional_text")]
    pub original: Option<String>,
    #[serde(default, deserialize_with = "optional_text")]
    pub updated: Option<String>,
}

fn value_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn section_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(value_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn optional_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(value_text(Value::deserialize(deserializer)?))
}

impl DiffItem {
    pub fn is_addition(&self) -> bool {
        self.original.is_none() && self.updated.is_some()
    }

    pub fn is_deletion(&self) -> bool {
        self.original.is_some() && self.updated.is_none()
    }

    /// Neither side present. Models occasionally emit these for sections
    /// they mention but do not change.
    pub fn is_noop(&self) -> bool {
        self.original.is_none() && self.updated.is_none()
    }
}

/// The validated result of a diff request.
///
/// Field names match the JSON the model is asked to emit, so the same
/// value serialises back to the wire format unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub summary: String,
    pub diff_list: Vec<DiffItem>,
}

impl DiffResult {
    pub fn len(&self) -> usize {
        self.diff_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diff_list.is_empty()
    }
}
