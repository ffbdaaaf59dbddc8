//! CLI binary for edgequake-docdiff.
//!
//! A thin shim over the library crate that maps CLI flags to `DiffConfig`,
//! loads a local file as the upload and prints the resulting diff.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docdiff::{
    extract_document, load_document, process_document, ConfigurationSource, DiffConfig,
    DiffResult, DocDiffError, ExtractionMode, JsonPromptStore, PipelineProgressCallback,
    PipelineStage, ProgressCallback, PromptConfiguration,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that names the running stage and logs each finished one.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: PipelineStage) {
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: PipelineStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<18} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_fallback(&self, mode: ExtractionMode) {
        let what = match mode {
            ExtractionMode::FallbackMetadata => "PDF has no text layer; using its metadata",
            _ => "PDF could not be parsed; using a description of the file",
        };
        self.bar.println(format!("  {} {}", yellow("⚠"), what));
    }

    fn on_stage_error(&self, stage: PipelineStage, _error: &str) {
        self.bar.println(format!("  {} {stage}", red("✗")));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Describe a change and get a diff
  docdiff contract.docx --changes "Extend the term from 12 to 24 months"

  # Read the change description from a file, JSON output
  docdiff policy.pdf --changes-file changes.txt --json > diff.json

  # Use a specific model
  docdiff --model gpt-4.1-mini --provider openai report.pdf -c "Remove section 4"

  # Show the extracted, normalized text (no API key needed)
  docdiff --extract-only contract.docx

  # Inspect or edit the prompt record
  docdiff --show-prompt
  docdiff --set-system-prompt system.txt --set-main-prompt main.txt

PROMPT TEMPLATE:
  The main prompt must contain {originalDoc} and {changes}; the first
  occurrence of each is replaced with the document text and the change
  description. The record lives in prompts/system_prompt.json unless
  --prompt-file or DOCDIFF_PROMPT_FILE says otherwise.

EXIT CODES:
  0  diff produced
  1  LLM, configuration or internal failure
  2  invalid input (unsupported format, empty changes, unreadable document)

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  DOCDIFF_PROMPT_FILE     Location of the prompt record
  PDFIUM_LIB_PATH         Path to libpdfium (or its directory); default: system lookup
"#;

/// Generate a structured diff of requested changes to a PDF or Word document.
#[derive(Parser, Debug)]
#[command(
    name = "docdiff",
    version,
    about = "Generate a structured diff of requested changes to a PDF or Word document",
    long_about = "Extract the text of a PDF or Word document, combine it with a description of \
the intended changes, and ask an LLM for a section-by-section diff. Supports OpenAI, Anthropic, \
Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, DOCX or DOC file.
    input: Option<PathBuf>,

    /// Description of the intended changes.
    #[arg(short, long, env = "DOCDIFF_CHANGES", conflicts_with = "changes_file")]
    changes: Option<String>,

    /// Read the change description from a file.
    #[arg(long, env = "DOCDIFF_CHANGES_FILE")]
    changes_file: Option<PathBuf>,

    /// Declared media type. Default: inferred from the file extension.
    #[arg(long, env = "DOCDIFF_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Prompt record (JSON with systemPrompt / mainPrompt).
    #[arg(long, env = "DOCDIFF_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(
        long,
        env = "EDGEQUAKE_MODEL",
        long_help = "LLM model to use. Default: gpt-4.1.\n\
          Any chat model works; smaller models are cheaper but more often return malformed JSON."
    )]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCDIFF_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "DOCDIFF_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "DOCDIFF_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Maximum PDF pages to read.
    #[arg(long, env = "DOCDIFF_MAX_PAGES", default_value_t = 50)]
    max_pages: usize,

    /// pdfium shared library, or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_path: Option<PathBuf>,

    /// Output the DiffResult as JSON.
    #[arg(long, env = "DOCDIFF_JSON")]
    json: bool,

    /// Print the normalized extracted text only; no LLM call.
    #[arg(long)]
    extract_only: bool,

    /// Print the current prompt record and exit.
    #[arg(long)]
    show_prompt: bool,

    /// Replace the system prompt with the contents of this file.
    #[arg(long)]
    set_system_prompt: Option<PathBuf>,

    /// Replace the main prompt template with the contents of this file.
    #[arg(long)]
    set_main_prompt: Option<PathBuf>,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCDIFF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCDIFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCDIFF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs off
    // the terminal while it runs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            exit_code_for(&e)
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    // ── Prompt administration ────────────────────────────────────────────
    let store = match cli.prompt_file {
        Some(ref path) => JsonPromptStore::new(path),
        None => JsonPromptStore::from_env(),
    };

    if cli.set_system_prompt.is_some() || cli.set_main_prompt.is_some() {
        return update_prompts(cli, &store).await;
    }
    if cli.show_prompt {
        return show_prompts(cli, &store).await;
    }

    let input = cli
        .input
        .as_ref()
        .context("No input file given (see --help)")?;
    let document = load_document(input, cli.media_type.as_deref()).await?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let config = build_config(cli, None)?;
        let extracted = extract_document(document, &config)
            .await
            .context("Extraction failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&extracted).context("Failed to serialise text")?
            );
        } else {
            if extracted.extraction_mode.is_fallback() && !cli.quiet {
                eprintln!(
                    "{} extraction mode: {:?}",
                    yellow("⚠"),
                    extracted.extraction_mode
                );
            }
            println!("{}", extracted.content);
        }
        return Ok(());
    }

    // ── Diff ─────────────────────────────────────────────────────────────
    let changes = read_changes(cli).await?;

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb = spinner
        .as_ref()
        .map(|cb| Arc::clone(cb) as ProgressCallback);
    let config = build_config(cli, progress_cb)?;

    let result = process_document(document, &changes, &config).await;
    if let Some(ref cb) = spinner {
        cb.finish();
    }
    let diff = result.context("Diff generation failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&diff).context("Failed to serialise diff")?
        );
    } else {
        print_diff(&diff).context("Failed to write to stdout")?;
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {} change(s)",
            green("✔"),
            bold(&diff.diff_list.len().to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `DiffConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DiffConfig> {
    let mut builder = DiffConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .max_pdf_pages(cli.max_pages);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref path) = cli.prompt_file {
        builder = builder.prompt_file(path);
    }
    if let Some(ref path) = cli.pdfium_path {
        builder = builder.pdfium_library_path(path);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn read_changes(cli: &Cli) -> Result<String> {
    if let Some(ref path) = cli.changes_file {
        return read_text(path).await;
    }
    // An absent description is rejected by the library as MissingChanges.
    Ok(cli.changes.clone().unwrap_or_default())
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

async fn show_prompts(cli: &Cli, store: &JsonPromptStore) -> Result<()> {
    let record = store.read().await?;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise prompts")?
        );
        return Ok(());
    }
    println!("{} {}", bold("File:"), store.path().display());
    if let Some(ts) = record.last_updated {
        println!("{} {}", bold("Last updated:"), ts.to_rfc3339());
    }
    println!("\n{}\n{}", bold("System prompt:"), record.system_prompt);
    println!("\n{}\n{}", bold("Main prompt:"), record.main_prompt_template);
    for missing in record.missing_placeholders() {
        eprintln!("{} main prompt has no {} placeholder", yellow("⚠"), missing);
    }
    Ok(())
}

/// Write a new record; a prompt not given on the command line keeps its
/// current value (or the built-in default if the record is unreadable).
async fn update_prompts(cli: &Cli, store: &JsonPromptStore) -> Result<()> {
    let current = store.read().await.unwrap_or_else(|e| {
        tracing::warn!("{}; starting from built-in prompts", e);
        PromptConfiguration::default()
    });

    let system = match cli.set_system_prompt {
        Some(ref path) => read_text(path).await?,
        None => current.system_prompt,
    };
    let main = match cli.set_main_prompt {
        Some(ref path) => read_text(path).await?,
        None => current.main_prompt_template,
    };

    let record = store.write(&system, &main).await?;
    if !cli.quiet {
        eprintln!(
            "{} prompts saved to {}",
            green("✔"),
            bold(&store.path().display().to_string())
        );
        if let Some(ts) = record.last_updated {
            eprintln!("   {}", dim(&format!("last updated {}", ts.to_rfc3339())));
        }
    }
    Ok(())
}

fn print_diff(diff: &DiffResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}\n", diff.summary)?;
    for (i, item) in diff.diff_list.iter().enumerate() {
        let section = if item.section.is_empty() {
            "(no section)"
        } else {
            item.section.as_str()
        };
        writeln!(out, "{}. {}", i + 1, bold(section))?;
        match item.original {
            Some(ref text) => writeln!(out, "   {}", red(&format!("- {text}")))?,
            None => writeln!(out, "   {}", dim("- (added)"))?,
        }
        match item.updated {
            Some(ref text) => writeln!(out, "   {}", green(&format!("+ {text}")))?,
            None => writeln!(out, "   {}", dim("+ (removed)"))?,
        }
    }
    Ok(())
}

/// 2 for client-input errors, 1 for everything else.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    let client_error = error
        .chain()
        .filter_map(|e| e.downcast_ref::<DocDiffError>())
        .any(DocDiffError::is_client_error);
    if client_error {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}
