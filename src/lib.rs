//! # pdf-proofread
//!
//! Spell- and grammar-check the text of a PDF and produce an annotated copy.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     store the upload under a unique name (removed afterwards)
//!  ├─ 2. Extract   page text via pdfium or lopdf (spawn_blocking)
//!  ├─ 3. Check     LanguageTool-compatible HTTP service
//!  ├─ 4. Annotate  highlight spelling (blue) and grammar (green) spans
//!  ├─ 5. Render    annotated PDF with one detail block per match
//!  └─ 6. Preview   PNG of page 1
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_proofread::{analyze_file, LanguageToolClient, ProofreadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProofreadConfig::default();
//!     let checker = LanguageToolClient::from_config(&config)?;
//!     let artifacts = analyze_file("uploads/tesis.pdf", &checker, &config)
//!         .await
//!         .into_result()?;
//!     println!("{}", artifacts.document_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | axum HTTP API ([`server`]) |
//! | `cli`    | on      | The `proofread` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! pdf-proofread = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod checker;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_file};
pub use checker::{GrammarChecker, GrammarMatch, LanguageToolClient};
pub use config::{ProofreadConfig, ProofreadConfigBuilder, TextBackend, DEFAULT_CHECKER_URL};
pub use error::ProofreadError;
pub use output::{AnalysisArtifacts, AnalysisOutcome, PipelineStage};
pub use pipeline::annotate::{annotate, AnnotatedDocument, ErrorDetail, Segment};
pub use pipeline::classify::ErrorCategory;
pub use pipeline::input::DocumentSource;
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
