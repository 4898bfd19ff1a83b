//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::ProofreadConfigBuilder::progress_callback`] to be told
//! when a run enters each [`PipelineStage`], and when it fails.
//!
//! # Example
//!
//! ```rust
//! use pdf_proofread::{AnalysisProgressCallback, PipelineStage, ProofreadConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     stages: Arc<AtomicUsize>,
//! }
//!
//! impl AnalysisProgressCallback for CountingCallback {
//!     fn on_stage(&self, stage: PipelineStage) {
//!         self.stages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("stage: {stage}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     stages: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ProofreadConfig::builder()
//!     .progress_callback(counter as Arc<dyn AnalysisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::PipelineStage;
use std::sync::Arc;

/// Called by the orchestrator as a run moves through its stages.
///
/// Implementations must be `Send + Sync`: the server shares one config (and
/// therefore one callback) across concurrent requests. All methods have
/// no-op defaults.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called each time the run reaches a new stage, `Received` first.
    fn on_stage(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called when a stage fails.
    ///
    /// # Arguments
    /// * `stage`: the last stage reached before the failure
    /// * `error`: human-readable error description
    fn on_failure(&self, stage: PipelineStage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ProofreadConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;
