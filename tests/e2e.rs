//! End-to-end integration tests for edgequake-docdiff.
//!
//! These tests make live LLM API calls (and, for PDFs, need a pdfium
//! library). They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! PDF tests additionally read sample files from `./test_cases/`.

use edgequake_docdiff::{
    extract_document, process_document, process_file, DiffConfig, ExtractionMode,
    PromptConfiguration, StaticPromptSource, UploadedDocument,
};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;
use zip::write::FileOptions;
use zip::ZipWriter;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set.
macro_rules! e2e_skip_unless_enabled {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    }};
}

/// Skip this test if E2E_ENABLED is not set *or* no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        e2e_skip_unless_enabled!();
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn contract_docx() -> UploadedDocument {
    let paragraphs = [
        "SERVICE AGREEMENT",
        "1. Parties. This agreement is made between Acme Corp and Beta Ltd.",
        "2. Term. The agreement runs for 12 months from the effective date.",
        "3. Fees. Beta Ltd pays Acme Corp 1,000 EUR per month.",
        "4. Termination. Either party may terminate with 30 days written notice.",
    ];
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("word/document.xml", FileOptions::default())
        .unwrap();
    zip.write_all(xml.as_bytes()).unwrap();
    let bytes = zip.finish().unwrap().into_inner();
    UploadedDocument::new(bytes, "", "service_agreement.docx")
}

fn default_prompts() -> DiffConfig {
    DiffConfig::builder()
        .prompt_source(Arc::new(StaticPromptSource::new(
            PromptConfiguration::default(),
        )))
        .build()
        .unwrap()
}

// ── Live diff tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_docx_term_change() {
    e2e_skip_unless_enabled!();

    let diff = process_document(
        contract_docx(),
        "Change the term from 12 months to 24 months and raise the fee to 1,200 EUR.",
        &default_prompts(),
    )
    .await
    .expect("diff should succeed");

    println!("{}", serde_json::to_string_pretty(&diff).unwrap());
    assert!(!diff.summary.trim().is_empty());
    assert!(!diff.diff_list.is_empty(), "expected at least one change");
    let mentions_term = diff
        .diff_list
        .iter()
        .any(|d| d.updated.as_deref().unwrap_or("").contains("24"));
    assert!(mentions_term, "no diff item mentions the new term");
}

#[tokio::test]
async fn test_docx_deletion() {
    e2e_skip_unless_enabled!();

    let diff = process_document(
        contract_docx(),
        "Delete the termination clause entirely.",
        &default_prompts(),
    )
    .await
    .expect("diff should succeed");

    println!("{}", serde_json::to_string_pretty(&diff).unwrap());
    assert!(!diff.diff_list.is_empty());
}

#[tokio::test]
async fn test_tiny_pdf_falls_back_and_still_answers() {
    e2e_skip_unless_enabled!();

    let doc = UploadedDocument::new(vec![0u8; 50], "application/pdf", "scan.pdf");
    let diff = process_document(
        doc,
        "The document is a one-page lease; change the rent from 900 to 950 EUR.",
        &default_prompts(),
    )
    .await
    .expect("fallback text should still produce a diff");
    assert!(!diff.summary.trim().is_empty());
}

#[tokio::test]
async fn test_sample_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let config = default_prompts();
    let doc = edgequake_docdiff::load_document(&path, None).await.unwrap();
    let text = extract_document(doc, &config).await.unwrap();
    println!("mode: {:?}, {} chars", text.extraction_mode, text.content.len());
    assert_eq!(text.extraction_mode, ExtractionMode::Full);

    let diff = process_file(&path, "Shorten the first paragraph.", &config)
        .await
        .expect("diff should succeed");
    assert!(!diff.summary.trim().is_empty());
}

#[tokio::test]
async fn test_sample_docx() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.docx"));

    let diff = process_file(&path, "Fix any spelling mistakes.", &default_prompts())
        .await
        .expect("diff should succeed");
    println!("{}", serde_json::to_string_pretty(&diff).unwrap());
}

// ── Config checks (no network) ───────────────────────────────────────────────

#[test]
fn test_config_builder_accepts_provider_name() {
    let config = DiffConfig::builder()
        .provider_name("anthropic")
        .model("claude-sonnet-4-20250514")
        .build()
        .unwrap();
    assert_eq!(config.provider_name.as_deref(), Some("anthropic"));
    assert_eq!(config.model.as_deref(), Some("claude-sonnet-4-20250514"));
}

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<edgequake_docdiff::NoopProgressCallback>();
    assert_send_sync::<DiffConfig>();
}
