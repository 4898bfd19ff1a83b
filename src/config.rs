//! Configuration types for a proofreading run.
//!
//! All pipeline behaviour is controlled through [`ProofreadConfig`], built
//! via its [`ProofreadConfigBuilder`]. One struct holds every knob so the
//! HTTP server can share a single `Arc<ProofreadConfig>` across requests and
//! the CLI can map flags onto it one-to-one.

use crate::error::ProofreadError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Public LanguageTool endpoint used when no other is configured.
pub const DEFAULT_CHECKER_URL: &str = "https://api.languagetool.org/v2/check";

/// Configuration for a proofreading run.
///
/// Built via [`ProofreadConfig::builder()`] or using
/// [`ProofreadConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_proofread::ProofreadConfig;
///
/// let config = ProofreadConfig::builder()
///     .language("es")
///     .output_dir("resultados")
///     .preview_dpi(150)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProofreadConfig {
    /// Language code sent to the checker. Default: `"es"`.
    pub language: String,

    /// LanguageTool `/v2/check` endpoint. Default: [`DEFAULT_CHECKER_URL`].
    pub checker_url: String,

    /// Request timeout for the checker call in seconds. Default: none.
    ///
    /// A stalled checker blocks the run until the connection drops.
    pub checker_timeout_secs: Option<u64>,

    /// Directory where uploads are materialized for the run. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory for rendered report PDFs. Default: `resultados`.
    pub output_dir: PathBuf,

    /// Directory for preview PNGs. Default: `vistas_previas`.
    pub preview_dir: PathBuf,

    /// Rasterisation DPI for the preview image. Range: 72–400. Default: 200.
    pub preview_dpi: u32,

    /// Body font size of the report in points. Range: 6–24. Default: 10.
    pub font_size: f32,

    /// How page text is pulled out of the submitted PDF. Default: pdfium.
    pub text_backend: TextBackend,

    /// Directory (or full path) of an existing libpdfium.
    ///
    /// When `None`, `PDFIUM_LIB_PATH`, the working directory and the system
    /// library are tried in that order.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives stage transitions as the pipeline runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProofreadConfig {
    fn default() -> Self {
        Self {
            language: "es".to_string(),
            checker_url: DEFAULT_CHECKER_URL.to_string(),
            checker_timeout_secs: None,
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("resultados"),
            preview_dir: PathBuf::from("vistas_previas"),
            preview_dpi: 200,
            font_size: 10.0,
            text_backend: TextBackend::default(),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProofreadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofreadConfig")
            .field("language", &self.language)
            .field("checker_url", &self.checker_url)
            .field("checker_timeout_secs", &self.checker_timeout_secs)
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("preview_dir", &self.preview_dir)
            .field("preview_dpi", &self.preview_dpi)
            .field("font_size", &self.font_size)
            .field("text_backend", &self.text_backend)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl ProofreadConfig {
    /// Create a new builder for `ProofreadConfig`.
    pub fn builder() -> ProofreadConfigBuilder {
        ProofreadConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProofreadConfig`].
#[derive(Debug)]
pub struct ProofreadConfigBuilder {
    config: ProofreadConfig,
}

impl ProofreadConfigBuilder {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.config.language = language.into();
        self
    }

    pub fn checker_url(mut self, url: impl Into<String>) -> Self {
        self.config.checker_url = url.into();
        self
    }

    pub fn checker_timeout_secs(mut self, secs: u64) -> Self {
        self.config.checker_timeout_secs = Some(secs.max(1));
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.preview_dir = dir.into();
        self
    }

    pub fn preview_dpi(mut self, dpi: u32) -> Self {
        self.config.preview_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.config.font_size = size.clamp(6.0, 24.0);
        self
    }

    pub fn text_backend(mut self, backend: TextBackend) -> Self {
        self.config.text_backend = backend;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProofreadConfig, ProofreadError> {
        let c = &self.config;
        if c.language.trim().is_empty() {
            return Err(ProofreadError::InvalidConfig(
                "Language code must not be empty".into(),
            ));
        }
        if !(c.checker_url.starts_with("http://") || c.checker_url.starts_with("https://")) {
            return Err(ProofreadError::InvalidConfig(format!(
                "Checker URL must be http(s), got '{}'",
                c.checker_url
            )));
        }
        if c.preview_dpi < 72 || c.preview_dpi > 400 {
            return Err(ProofreadError::InvalidConfig(format!(
                "Preview DPI must be 72–400, got {}",
                c.preview_dpi
            )));
        }
        for (name, dir) in [
            ("upload", &c.upload_dir),
            ("output", &c.output_dir),
            ("preview", &c.preview_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(ProofreadError::InvalidConfig(format!(
                    "The {name} directory must not be empty"
                )));
            }
        }
        Ok(self.config)
    }
}

/// Text extraction backend.
///
/// | Backend | Notes |
/// |---------|-------|
/// | `Pdfium` | Full text layer, needs libpdfium (default) |
/// | `Lopdf`  | Pure Rust; reads `Tj`/`TJ` strings, no font `ToUnicode` maps |
///
/// Previews always need pdfium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBackend {
    #[default]
    Pdfium,
    Lopdf,
}

impl fmt::Display for TextBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TextBackend::Pdfium => "pdfium",
            TextBackend::Lopdf => "lopdf",
        })
    }
}

impl FromStr for TextBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdfium" => Ok(TextBackend::Pdfium),
            "lopdf" => Ok(TextBackend::Lopdf),
            other => Err(format!("unknown text backend '{other}' (expected pdfium or lopdf)")),
        }
    }
}
