//! HTTP service mode
//!
//! | Method | Path         | Response                                   |
//! |--------|--------------|--------------------------------------------|
//! | POST   | `/render`    | PNG bytes with a `Content-Disposition` name |
//! | POST   | `/preview`   | merged HTML                                |
//! | GET    | `/templates` | `[{name, path, filename}]`                 |
//! | GET    | `/health`    | `{status, timestamp}`                      |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::batch::job_filename;
use crate::model::{CreativeConfig, JobRecord};
use crate::pipeline::{read_template, render_html};
use crate::{Error, RenderPipeline, ServerConfig};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
    pub templates_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: Arc<RenderPipeline>, templates_dir: impl Into<PathBuf>) -> Self {
        Self { pipeline, templates_dir: Arc::new(templates_dir.into()) }
    }
}

/// Errors returned to HTTP clients as JSON
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Request body is missing something; `{error}` only
    #[error("{0}")]
    BadRequest(String),

    /// Body is not JSON or does not fit [`RenderRequest`]; `{error, message}`
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    /// Rendering failed; `{error, message}`
    #[error("{context}: {source}")]
    Render {
        context: &'static str,
        #[source]
        source: Error,
    },
}

impl ApiError {
    fn render(context: &'static str) -> impl FnOnce(Error) -> ApiError {
        move |source| ApiError::Render { context, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::InvalidBody(rejection) => {
                let message = rejection.body_text();
                warn!("Rejected request body: {}", message);
                let body = Json(json!({
                    "error": "Invalid request body",
                    "message": message,
                }));
                (rejection.status(), body).into_response()
            }
            ApiError::Render { context, source } => {
                let status = match &source {
                    Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
                    Error::NotFound(_) => StatusCode::NOT_FOUND,
                    Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if source.is_client_error() {
                    warn!("{}: {}", context, source);
                } else {
                    error!("{}: {}", context, source);
                }
                let body = Json(json!({
                    "error": context,
                    "message": source.to_string(),
                }));
                (status, body).into_response()
            }
        }
    }
}

/// Body of `POST /render` and `POST /preview`
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// A single job record or an array of them (first one is used)
    pub job: Option<serde_json::Value>,
    pub creative: Option<CreativeConfig>,
    #[serde(rename = "templatePath", alias = "template_path")]
    pub template_path: Option<String>,
}

struct ResolvedRequest {
    job: JobRecord,
    creative: CreativeConfig,
    template: PathBuf,
}

impl RenderRequest {
    fn resolve(self, templates_dir: &Path, context: &'static str) -> Result<ResolvedRequest, ApiError> {
        let (Some(job), Some(creative)) = (self.job, self.creative) else {
            return Err(ApiError::BadRequest("Missing required fields: job and creative".into()));
        };
        let Some(template_path) = self.template_path.filter(|p| !p.trim().is_empty()) else {
            return Err(ApiError::BadRequest("Missing template path".into()));
        };

        let job = match job {
            serde_json::Value::Array(items) => items.into_iter().next(),
            serde_json::Value::Null => None,
            other => Some(other),
        }
        .ok_or_else(|| {
            ApiError::BadRequest(
                "No job data found. Please provide a job object or non-empty array of jobs.".into(),
            )
        })?;
        let job: JobRecord = serde_json::from_value(job).map_err(|e| ApiError::render(context)(e.into()))?;

        let template = resolve_template(templates_dir, &template_path).map_err(ApiError::render(context))?;
        Ok(ResolvedRequest { job, creative, template })
    }
}

/// Confine a requested template path to `templates_dir`.
///
/// Accepts a bare filename, a path relative to the templates directory, or
/// a path (relative to the working directory or absolute) that lands inside
/// it.
pub fn resolve_template(templates_dir: &Path, requested: &str) -> crate::Result<PathBuf> {
    let not_found = || Error::NotFound(format!("Template not found: {}", requested));

    let root = templates_dir.canonicalize().map_err(|_| not_found())?;
    let requested_path = Path::new(requested);
    let candidates = [root.join(requested_path), requested_path.to_path_buf()];

    candidates
        .iter()
        .filter_map(|c| c.canonicalize().ok())
        .find(|c| c.starts_with(&root) && c.is_file())
        .ok_or_else(not_found)
}

pub async fn render_png(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Failed to render PNG";
    let Json(req) = body?;
    let req = req.resolve(&state.templates_dir, CONTEXT)?;
    info!("Rendering job: {}", req.job.identity());

    let png = state
        .pipeline
        .render(&req.template, &req.job, &req.creative)
        .await
        .map_err(ApiError::render(CONTEXT))?;

    let filename = job_filename(&req.job);
    info!("Successfully rendered: {}", filename);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename)),
        ],
        png,
    )
        .into_response())
}

pub async fn render_preview(
    State(state): State<AppState>,
    body: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Failed to render preview";
    let Json(req) = body?;
    let req = req.resolve(&state.templates_dir, CONTEXT)?;

    let template = read_template(&req.template).await.map_err(ApiError::render(CONTEXT))?;
    let html = render_html(&template, &req.job, &req.creative).map_err(ApiError::render(CONTEXT))?;

    Ok(([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html).into_response())
}

/// One entry of `GET /templates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub name: String,
    pub path: String,
    pub filename: String,
}

/// List `*.html` files in `dir`, sorted by filename.
pub fn list_templates(dir: &Path) -> crate::Result<Vec<TemplateInfo>> {
    let mut templates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("html") {
            continue;
        }
        let (Some(filename), Some(name)) = (
            path.file_name().and_then(|f| f.to_str()),
            path.file_stem().and_then(|f| f.to_str()),
        ) else {
            continue;
        };
        templates.push(TemplateInfo {
            name: name.to_string(),
            filename: filename.to_string(),
            path: path.display().to_string(),
        });
    }
    templates.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(templates)
}

pub async fn templates(State(state): State<AppState>) -> Response {
    let dir = state.templates_dir.clone();
    let listed = tokio::task::spawn_blocking(move || list_templates(&dir))
        .await
        .unwrap_or_else(|e| Err(Error::Other(format!("template listing task failed: {}", e))));
    match listed {
        Ok(list) => Json(list).into_response(),
        Err(e) => {
            error!("Failed to load templates from {}: {}", state.templates_dir.display(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to load templates" })),
            )
                .into_response()
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Endpoint not found" })))
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(templates))
        .route("/render", post(render_png))
        .route("/preview", post(render_preview))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Serve until SIGINT/SIGTERM, then close the shared backend.
pub async fn serve(config: ServerConfig, pipeline: Arc<RenderPipeline>) -> crate::Result<()> {
    let state = AppState::new(pipeline.clone(), config.templates_dir.clone());
    let app = build_router(state, config.body_limit);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Job card server running on http://{}", addr);
    info!("Endpoints:");
    info!("  - POST /render");
    info!("  - POST /preview");
    info!("  - GET  /templates ({})", config.templates_dir.display());
    info!("  - GET  /health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pipeline.shutdown().await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received CTRL+C, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
