//! HTTP API.
//!
//! | Method | Path                    | Purpose                                |
//! |--------|-------------------------|----------------------------------------|
//! | POST   | `/api/analyze`          | multipart field `document`, runs a job |
//! | GET    | `/api/download/*path`   | artifact as attachment                 |
//! | GET    | `/api/preview/*path`    | artifact inline                        |
//! | DELETE | `/api/delete/*path`     | artifact and its preview               |
//!
//! Artifact paths are relative to the server root, the same strings
//! `/api/analyze` returns. Absolute paths and `..` segments are treated as
//! not found.

use crate::analyze::analyze_bytes;
use crate::checker::GrammarChecker;
use crate::config::ProofreadConfig;
use crate::error::ProofreadError;
use crate::pipeline::preview::preview_file_name;
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Name of the multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "document";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ProofreadConfig>,
    checker: Arc<dyn GrammarChecker>,
    root: PathBuf,
}

impl AppState {
    /// Relative directories in `config` are taken relative to `root`.
    pub fn new(
        mut config: ProofreadConfig,
        checker: Arc<dyn GrammarChecker>,
        root: impl Into<PathBuf>,
    ) -> Self {
        let root = root.into();
        for dir in [
            &mut config.upload_dir,
            &mut config.output_dir,
            &mut config.preview_dir,
        ] {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
        Self {
            config: Arc::new(config),
            checker,
            root,
        }
    }

    pub fn config(&self) -> &ProofreadConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a client-supplied relative path onto the root.
    fn resolve(&self, requested: &str) -> Result<PathBuf, ApiError> {
        resolve_under(&self.root, requested)
            .ok_or_else(|| ApiError::NotFound(format!("Archivo no encontrado: '{requested}'")))
    }

    /// Path string handed back to clients.
    fn public_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    Router::new()
        .route("/api/analyze", post(analyze_document))
        .route("/api/download/*path", get(download))
        .route("/api/preview/*path", get(preview))
        .route("/api/delete/*path", delete(delete_artifact))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server shutdown complete");
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// Body of a successful `/api/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub message: String,
    /// Rendered report, relative to the server root.
    pub result_filename: String,
    /// Preview PNG, `None` when it could not be produced.
    pub preview_filename: Option<String>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

async fn analyze_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!("Ignoring multipart field {:?}", field.name());
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        warn!("No '{}' field in upload", UPLOAD_FIELD);
        return Err(ApiError::BadRequest(
            "No se proporcionó un archivo".to_string(),
        ));
    };
    info!("Received {:?} ({} bytes)", filename, bytes.len());

    let outcome = analyze_bytes(
        filename.as_deref(),
        bytes.to_vec(),
        state.checker.as_ref(),
        &state.config,
    )
    .await;
    let artifacts = outcome.into_result()?;

    Ok(Json(AnalyzeResponse {
        message: "Análisis ortográfico completado".to_string(),
        result_filename: state.public_path(&artifacts.document_path),
        preview_filename: artifacts.preview_path.map(|p| state.public_path(&p)),
    }))
}

async fn download(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Response, ApiError> {
    let path = state.resolve(&requested)?;
    file_response(&path, &requested, "attachment").await
}

async fn preview(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Response, ApiError> {
    let path = state.resolve(&requested)?;
    file_response(&path, &requested, "inline").await
}

async fn delete_artifact(
    State(state): State<AppState>,
    UrlPath(requested): UrlPath<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let path = state.resolve(&requested)?;
    if !path.is_file() {
        return Err(ApiError::NotFound(format!(
            "Archivo no encontrado: '{requested}'"
        )));
    }

    tokio::fs::remove_file(&path).await?;
    info!("Deleted {}", path.display());

    let preview = state.config.preview_dir.join(preview_file_name(&path));
    match tokio::fs::remove_file(&preview).await {
        Ok(()) => info!("Deleted {}", preview.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    Ok(Json(MessageResponse {
        message: "Archivo eliminado".to_string(),
    }))
}

async fn file_response(
    path: &Path,
    requested: &str,
    disposition: &str,
) -> Result<Response, ApiError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e)
            if e.kind() == std::io::ErrorKind::NotFound || path.is_dir() =>
        {
            return Err(ApiError::NotFound(format!(
                "Archivo no encontrado: '{requested}'"
            )))
        }
        Err(e) => return Err(e.into()),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("{disposition}; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

/// Content type from the file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// `root.join(requested)` when `requested` is a plain relative path.
fn resolve_under(root: &Path, requested: &str) -> Option<PathBuf> {
    let rel = Path::new(requested);
    let mut components = rel.components().peekable();
    components.peek()?;
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Some(root.join(rel))
    } else {
        None
    }
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Handler error, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Proofread(#[from] ProofreadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Proofread(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Proofread(_) | ApiError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected ({}): {}", status, self);
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
