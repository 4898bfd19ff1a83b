//! Error types for the pdf-proofread library.
//!
//! [`ProofreadError`] covers every failure a pipeline stage can report. The
//! stages themselves return `Result<_, ProofreadError>`; the orchestrator in
//! [`crate::analyze`] never propagates them and instead records the first
//! failure inside [`crate::output::AnalysisOutcome`], so the HTTP layer and
//! the CLI decide how to surface it.
//!
//! A preview error only costs the preview; every other error ends the run
//! with no artifacts.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf-proofread library.
#[derive(Debug, Error)]
pub enum ProofreadError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input PDF was not found or could not be opened for reading.
    #[error("Archivo no encontrado: '{path}'")]
    DocumentNotFound { path: PathBuf },

    /// The file exists but pdfium could not parse it as a PDF.
    #[error("PDF '{path}' is corrupt or unreadable: {detail}")]
    DocumentCorrupt { path: PathBuf, detail: String },

    /// The upload is not something the pipeline can consume.
    #[error("Tipo de archivo no admitido: {detail}")]
    UnsupportedInputType { detail: String },

    /// The upload could not be written to the upload directory.
    #[error("Failed to store upload at '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Checker errors ────────────────────────────────────────────────────
    /// The grammar-checking service could not be reached or answered garbage.
    #[error("Grammar checker at '{endpoint}' is unavailable: {reason}")]
    CheckerUnavailable { endpoint: String, reason: String },

    // ── Artifact errors ───────────────────────────────────────────────────
    /// The annotated report PDF could not be produced.
    #[error("Failed to render report '{path}': {detail}")]
    RenderFailure { path: PathBuf, detail: String },

    /// The preview PNG could not be produced from the rendered report.
    #[error("Failed to generate preview for '{path}': {detail}")]
    PreviewFailure { path: PathBuf, detail: String },

    // ── Environment errors ────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or pass --pdfium-lib.\n"
    )]
    PdfiumBindingFailed(String),

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (task panics and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProofreadError {
    /// True for failures that mean "the input file is not there".
    ///
    /// The HTTP layer answers these with 404 instead of 500.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProofreadError::DocumentNotFound { .. })
    }

    /// True for failures that only cost an artifact, not the whole run.
    pub fn is_artifact_failure(&self) -> bool {
        matches!(
            self,
            ProofreadError::RenderFailure { .. } | ProofreadError::PreviewFailure { .. }
        )
    }
}
