//! Result types produced by a proofreading run.

use crate::error::ProofreadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stages of a single run, in the order they are reached.
///
/// The run is linear: each stage is entered only after the previous one
/// succeeded. `Failed` can follow any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Received,
    TextExtracted,
    Checked,
    Rendered,
    PreviewGenerated,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::TextExtracted => "text extracted",
            PipelineStage::Checked => "checked",
            PipelineStage::Rendered => "rendered",
            PipelineStage::PreviewGenerated => "preview generated",
            PipelineStage::Done => "done",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a run left behind.
///
/// Never returned as an `Err`: failures are recorded in `failure` and the
/// artifact paths are `None` for whatever could not be produced. A run that
/// failed before rendering has both paths `None`; a run whose preview failed
/// keeps its `document_path`.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// `Done` on success, `Failed` otherwise.
    pub stage: PipelineStage,
    /// Last stage reached before `Failed`, equal to `stage` on success.
    pub last_completed: PipelineStage,
    /// Rendered report PDF.
    pub document_path: Option<PathBuf>,
    /// Page-1 preview PNG.
    pub preview_path: Option<PathBuf>,
    /// Number of matches the checker reported.
    pub match_count: usize,
    /// The error that stopped (or degraded) the run.
    pub failure: Option<ProofreadError>,
}

impl AnalysisOutcome {
    pub(crate) fn failed(last_completed: PipelineStage, error: ProofreadError) -> Self {
        Self {
            stage: PipelineStage::Failed,
            last_completed,
            document_path: None,
            preview_path: None,
            match_count: 0,
            failure: Some(error),
        }
    }

    /// True when every artifact was produced.
    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Done
    }

    /// The `(document, preview)` pair, either side possibly absent.
    pub fn paths(&self) -> (Option<&PathBuf>, Option<&PathBuf>) {
        (self.document_path.as_ref(), self.preview_path.as_ref())
    }

    /// Convert into a `Result` for callers that want `?`.
    ///
    /// A missing report is an error; a missing preview is not, the artifacts
    /// simply carry `preview_path: None`.
    pub fn into_result(self) -> Result<AnalysisArtifacts, ProofreadError> {
        match self.document_path {
            Some(document_path) => Ok(AnalysisArtifacts {
                document_path,
                preview_path: self.preview_path,
                match_count: self.match_count,
            }),
            None => Err(self.failure.unwrap_or_else(|| {
                ProofreadError::Internal("run ended without a report or an error".into())
            })),
        }
    }
}

/// Artifacts of a run that produced its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisArtifacts {
    pub document_path: PathBuf,
    pub preview_path: Option<PathBuf>,
    pub match_count: usize,
}
