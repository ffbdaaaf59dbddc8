//! Whitespace normalisation of extracted text.
//!
//! Extractors leave behind a lot of incidental layout: hard-wrapped lines,
//! runs of spaces from justified text, tab stops, CRLF endings. None of it
//! means anything to the model, and all of it costs tokens. The one layout
//! signal worth keeping is the paragraph break.
//!
//! Rules, applied in a single pass:
//! 1. A whitespace run containing two or more newlines becomes `"\n\n"`
//! 2. Any other whitespace run becomes `" "`
//! 3. Leading/trailing whitespace is removed
//!
//! The output contains only `" "` and `"\n\n"` separators, both of which map
//! to themselves under the same rules, so the function is idempotent.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static RE_WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonicalise whitespace while keeping paragraph boundaries.
pub fn normalize_text(input: &str) -> String {
    RE_WHITESPACE_RUN
        .replace_all(input.trim(), |caps: &Captures<'_>| {
            if caps[0].matches('\n').count() >= 2 {
                "\n\n"
            } else {
                " "
            }
        })
        .into_owned()
}
