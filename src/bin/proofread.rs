//! CLI binary for pdf-proofread.
//!
//! `proofread analyze` runs one document through the pipeline;
//! `proofread serve` exposes the HTTP API.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_proofread::server::{self, AppState};
use pdf_proofread::{
    analyze_bytes, AnalysisOutcome, AnalysisProgressCallback, GrammarChecker,
    LanguageToolClient, PipelineStage, ProgressCallback, ProofreadConfig, TextBackend,
    DEFAULT_CHECKER_URL,
};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that prints one line per completed stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Proofreading");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: PipelineStage) {
        let next = match stage {
            PipelineStage::Received => "extracting text…",
            PipelineStage::TextExtracted => "checking spelling and grammar…",
            PipelineStage::Checked => "rendering report…",
            PipelineStage::Rendered => "rendering preview…",
            PipelineStage::PreviewGenerated | PipelineStage::Done | PipelineStage::Failed => "",
        };
        if stage == PipelineStage::Done {
            self.bar.finish_and_clear();
            return;
        }
        self.bar.println(format!("  {} {}", green("✓"), stage));
        self.bar.set_message(next);
    }

    fn on_failure(&self, stage: PipelineStage, error: &str) {
        self.bar.println(format!("  {} after '{}': {}", red("✗"), stage, red(error)));
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check one document
  proofread analyze tesis.pdf

  # Machine-readable result
  proofread analyze --json tesis.pdf > result.json

  # Use a local LanguageTool server
  proofread --checker-url http://localhost:8081/v2/check analyze tesis.pdf

  # Run the HTTP API
  proofread serve --bind 0.0.0.0:5000 --root /srv/proofread

ENVIRONMENT VARIABLES:
  PROOFREAD_LANGUAGE      Language code sent to the checker (default: es)
  PROOFREAD_CHECKER_URL   LanguageTool-compatible /v2/check endpoint
  PROOFREAD_TEXT_BACKEND  pdfium (default) or lopdf
  PDFIUM_LIB_PATH         Path to an existing libpdfium (file or directory)
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Spell and grammar check PDF documents.
#[derive(Parser, Debug)]
#[command(name = "proofread", version, about, after_help = AFTER_HELP)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Language code sent to the checker.
    #[arg(long, global = true, env = "PROOFREAD_LANGUAGE", default_value = "es")]
    language: String,

    /// LanguageTool-compatible check endpoint.
    #[arg(long, global = true, env = "PROOFREAD_CHECKER_URL", default_value = DEFAULT_CHECKER_URL)]
    checker_url: String,

    /// Checker request timeout in seconds (none by default).
    #[arg(long, global = true, env = "PROOFREAD_CHECKER_TIMEOUT")]
    checker_timeout: Option<u64>,

    /// Where uploads are stored while they are processed.
    #[arg(long, global = true, env = "PROOFREAD_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Where annotated reports are written.
    #[arg(long, global = true, env = "PROOFREAD_OUTPUT_DIR", default_value = "resultados")]
    output_dir: PathBuf,

    /// Where preview images are written.
    #[arg(long, global = true, env = "PROOFREAD_PREVIEW_DIR", default_value = "vistas_previas")]
    preview_dir: PathBuf,

    /// Preview resolution (72–400).
    #[arg(long, global = true, env = "PROOFREAD_PREVIEW_DPI", default_value_t = 200)]
    preview_dpi: u32,

    /// Report body font size in points (6–24).
    #[arg(long, global = true, env = "PROOFREAD_FONT_SIZE", default_value_t = 10.0)]
    font_size: f32,

    /// Text extraction backend: pdfium or lopdf.
    #[arg(long, global = true, env = "PROOFREAD_TEXT_BACKEND", default_value = "pdfium")]
    text_backend: TextBackend,

    /// Path to libpdfium, or the directory containing it.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Debug logging.
    #[arg(short, long, global = true, env = "PROOFREAD_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "PROOFREAD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a single PDF and write the annotated report and preview.
    Analyze {
        /// PDF to check. The file itself is left untouched.
        input: PathBuf,

        /// Print the result as JSON on stdout.
        #[arg(long)]
        json: bool,

        /// Disable the progress spinner.
        #[arg(long, env = "PROOFREAD_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Serve the HTTP API.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "PROOFREAD_BIND", default_value = "127.0.0.1:5000")]
        bind: SocketAddr,

        /// Directory that relative artifact paths are resolved against.
        #[arg(long, env = "PROOFREAD_ROOT", default_value = ".")]
        root: PathBuf,
    },
}

/// JSON printed by `analyze --json`.
#[derive(Serialize)]
struct JsonResult {
    stage: PipelineStage,
    last_completed: PipelineStage,
    document_path: Option<PathBuf>,
    preview_path: Option<PathBuf>,
    match_count: usize,
    error: Option<String>,
}

impl From<&AnalysisOutcome> for JsonResult {
    fn from(o: &AnalysisOutcome) -> Self {
        Self {
            stage: o.stage,
            last_completed: o.last_completed,
            document_path: o.document_path.clone(),
            preview_path: o.preview_path.clone(),
            match_count: o.match_count,
            error: o.failure.as_ref().map(|e| e.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback while it is active.
    let show_progress = match &cli.command {
        Command::Analyze {
            json, no_progress, ..
        } => !cli.quiet && !no_progress && !json,
        Command::Serve { .. } => false,
    };
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

    match &cli.command {
        Command::Analyze { input, json, .. } => {
            let progress_cb: Option<ProgressCallback> = if show_progress {
                Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
            } else {
                None
            };
            let config = build_config(&cli, progress_cb)?;
            run_analyze(input, *json, &config).await
        }
        Command::Serve { bind, root } => {
            let config = build_config(&cli, None)?;
            run_serve(*bind, root.clone(), config).await
        }
    }
}

fn build_config(cli: &Cli, progress_cb: Option<ProgressCallback>) -> Result<ProofreadConfig> {
    let mut builder = ProofreadConfig::builder()
        .language(&cli.language)
        .checker_url(&cli.checker_url)
        .upload_dir(&cli.upload_dir)
        .output_dir(&cli.output_dir)
        .preview_dir(&cli.preview_dir)
        .preview_dpi(cli.preview_dpi)
        .font_size(cli.font_size)
        .text_backend(cli.text_backend);

    if let Some(secs) = cli.checker_timeout {
        builder = builder.checker_timeout_secs(secs);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_analyze(input: &Path, json: bool, config: &ProofreadConfig) -> Result<()> {
    // The pipeline removes its input; hand it a copy of the bytes instead.
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let checker =
        LanguageToolClient::from_config(config).context("Failed to build checker client")?;
    let outcome = analyze_bytes(filename.as_deref(), bytes, &checker, config).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonResult::from(&outcome))
                .context("Failed to serialize result")?
        );
    } else {
        if let Some(ref doc) = outcome.document_path {
            println!("Report:   {}", doc.display());
        }
        if let Some(ref preview) = outcome.preview_path {
            println!("Preview:  {}", preview.display());
        }
        if outcome.is_success() {
            eprintln!(
                "{} {} issues found",
                green("✔"),
                bold(&outcome.match_count.to_string())
            );
        }
    }

    if let Some(err) = outcome.failure {
        bail!(err);
    }
    Ok(())
}

async fn run_serve(bind: SocketAddr, root: PathBuf, config: ProofreadConfig) -> Result<()> {
    let checker: Arc<dyn GrammarChecker> = Arc::new(
        LanguageToolClient::from_config(&config).context("Failed to build checker client")?,
    );
    let state = AppState::new(config, checker, root);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;

    server::serve(listener, state, shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
