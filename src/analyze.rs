//! Run orchestration: one document in, a report and a preview out.
//!
//! ## Failure policy
//!
//! [`analyze`] never returns an error. It records where the run stopped in
//! an [`AnalysisOutcome`]:
//!
//! | failing stage       | `document_path` | `preview_path` |
//! |---------------------|-----------------|----------------|
//! | input / extraction  | `None`          | `None`         |
//! | checker             | `None`          | `None`         |
//! | report rendering    | `None`          | `None`         |
//! | preview             | `Some`          | `None`         |
//!
//! The materialized input is removed when the run ends, whatever happened.

use crate::checker::GrammarChecker;
use crate::config::ProofreadConfig;
use crate::error::ProofreadError;
use crate::output::{AnalysisOutcome, PipelineStage};
use crate::pipeline::input::{self, DocumentSource};
use crate::pipeline::{annotate, extract, preview, report};
use crate::progress::ProgressCallback;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Analyze one document with `checker`.
pub async fn analyze(
    source: DocumentSource,
    checker: &dyn GrammarChecker,
    config: &ProofreadConfig,
) -> AnalysisOutcome {
    let started = Instant::now();
    let mut stages = StageTracker::new(config.progress_callback.as_ref());
    stages.enter(PipelineStage::Received);

    let stem = source.stem();

    // ── Step 1: Materialize input ────────────────────────────────────────
    let input = match input::materialize(source, &config.upload_dir) {
        Ok(input) => input,
        Err(e) => return stages.fail(e),
    };

    // ── Step 2: Extract text ─────────────────────────────────────────────
    let text = match extract::extract_text(
        input.path(),
        config.text_backend,
        config.pdfium_lib_path.as_deref(),
    )
    .await
    {
        Ok(text) => text,
        Err(e) => return stages.fail(e),
    };
    drop(input);
    debug!("Extracted {} chars", text.chars().count());
    stages.enter(PipelineStage::TextExtracted);

    // ── Step 3: Check ────────────────────────────────────────────────────
    let matches = match checker.check(&text).await {
        Ok(matches) => matches,
        Err(e) => return stages.fail(e),
    };
    info!("Checker reported {} matches", matches.len());
    stages.enter(PipelineStage::Checked);

    // ── Step 4: Annotate and render ──────────────────────────────────────
    let annotated = annotate::annotate(&text, &matches);
    let output_dir = config.output_dir.clone();
    let font_size = config.font_size;
    let rendered = tokio::task::spawn_blocking(move || {
        report::render_report(&annotated, &output_dir, &stem, font_size)
    })
    .await
    .map_err(|e| ProofreadError::Internal(format!("Render task panicked: {}", e)))
    .and_then(|r| r);

    let document_path = match rendered {
        Ok(path) => path,
        Err(e) => return stages.fail(e),
    };
    stages.enter(PipelineStage::Rendered);

    // ── Step 5: Preview ──────────────────────────────────────────────────
    let preview_path = match preview::generate_preview(
        &document_path,
        &config.preview_dir,
        config.preview_dpi,
        config.pdfium_lib_path.as_deref(),
    )
    .await
    {
        Ok(path) => path,
        Err(e) => {
            warn!("Report kept without preview: {}", document_path.display());
            let mut outcome = stages.fail(e);
            outcome.document_path = Some(document_path);
            outcome.match_count = matches.len();
            return outcome;
        }
    };
    stages.enter(PipelineStage::PreviewGenerated);

    stages.enter(PipelineStage::Done);
    info!(
        "Analysis finished in {} ms: {} matches",
        started.elapsed().as_millis(),
        matches.len()
    );

    AnalysisOutcome {
        stage: PipelineStage::Done,
        last_completed: PipelineStage::Done,
        document_path: Some(document_path),
        preview_path: Some(preview_path),
        match_count: matches.len(),
        failure: None,
    }
}

/// Analyze a file already on disk. The file is removed when the run ends.
pub async fn analyze_file(
    path: impl Into<PathBuf>,
    checker: &dyn GrammarChecker,
    config: &ProofreadConfig,
) -> AnalysisOutcome {
    analyze(DocumentSource::Path(path.into()), checker, config).await
}

/// Analyze uploaded bytes. `filename` is the client-side name, if known.
pub async fn analyze_bytes(
    filename: Option<&str>,
    bytes: Vec<u8>,
    checker: &dyn GrammarChecker,
    config: &ProofreadConfig,
) -> AnalysisOutcome {
    let source = DocumentSource::Upload {
        filename: filename.map(str::to_string),
        bytes,
    };
    analyze(source, checker, config).await
}

/// Logs stage transitions and forwards them to the progress callback.
struct StageTracker<'a> {
    callback: Option<&'a ProgressCallback>,
    last: PipelineStage,
}

impl<'a> StageTracker<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            callback,
            last: PipelineStage::Received,
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        info!("Stage: {}", stage);
        self.last = stage;
        if let Some(cb) = self.callback {
            cb.on_stage(stage);
        }
    }

    fn fail(&self, error: ProofreadError) -> AnalysisOutcome {
        if error.is_artifact_failure() {
            warn!("Analysis degraded after stage '{}': {}", self.last, error);
        } else {
            error!("Analysis failed after stage '{}': {}", self.last, error);
        }
        if let Some(cb) = self.callback {
            cb.on_failure(self.last, &error.to_string());
        }
        AnalysisOutcome::failed(self.last, error)
    }
}
