//! Pipeline stages for document diffing.
//!
//! Each submodule implements one step; [`crate::process`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! detect ──▶ extract ──▶ normalize ──▶ compose ──▶ llm
//! (MIME/ext)  (pdf|word)  (whitespace)  (prompt)    (JSON diff)
//! ```
//!
//! 1. [`detect`]    : classify the upload as PDF, Word or unsupported
//! 2. [`extract`]   : dispatch to [`pdf`] or [`word`]; both parse in
//!    `spawn_blocking` because the parsers are synchronous
//! 3. [`normalize`] : canonical whitespace, so prompts stay compact
//! 4. [`compose`]   : fill the persisted prompt template
//! 5. [`llm`]       : the only stage with network I/O; validates the reply

pub mod compose;
pub mod detect;
pub mod extract;
pub mod llm;
pub mod normalize;
pub mod pdf;
pub mod word;
