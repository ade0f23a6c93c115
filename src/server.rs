//! HTTP API over the pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service name, version, endpoint list |
//! | `GET`  | `/health` | Readiness and indexed chunk count |
//! | `POST` | `/ask` | Answer a question (`{"question": "..."}`) |
//! | `POST` | `/upload` | Multipart `files` (`.txt`/`.md`), saved and indexed |
//! | `POST` | `/rebuild` | Rebuild the index from the documents directory |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! `bad_request` (400), `not_initialized` (503); every other pipeline failure
//! is a 500 whose code is the error kind (e.g. `remote_call_error`).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::loader::{is_supported, SUPPORTED_EXTENSIONS};
use crate::pipeline::{validate_question, Pipeline};

/// Shared handler state. Readers (`/ask`, `/health`) share the lock;
/// `/upload` and `/rebuild` take it exclusively.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RwLock<Pipeline>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(RwLock::new(pipeline)),
        }
    }
}

/// Build the router with CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/upload", post(handle_upload))
        .route("/rebuild", post(handle_rebuild))
        .layer(cors)
        .with_state(state)
}

/// Serve on `bind` until the process is terminated.
pub async fn run_server(bind: &str, pipeline: Pipeline) -> anyhow::Result<()> {
    let app = router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match err {
            PipelineError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(code = err.kind(), error = %err, "request failed");
        }
        AppError {
            status,
            code: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "doc-qa",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /health",
            "ask": "POST /ask",
            "upload": "POST /upload",
            "rebuild": "POST /rebuild",
        }
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    vector_store_initialized: bool,
    total_documents: Option<usize>,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.pipeline.read().await.status();
    Json(HealthResponse {
        status: "healthy".to_string(),
        vector_store_initialized: status.initialized,
        total_documents: status.total_documents,
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<String>,
    highlighted_answer: Option<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    validate_question(&req.question).map_err(bad_request)?;

    let record = state.pipeline.read().await.ask(&req.question).await?;
    let highlighted_answer = record.highlighted_answer();

    Ok(Json(AskResponse {
        answer: record.answer,
        sources: record.sources,
        highlighted_answer,
    }))
}

// ============ POST /upload ============

#[derive(Serialize)]
struct UploadResponse {
    message: String,
    files_uploaded: Vec<String>,
    failed: Vec<String>,
    total_documents: usize,
}

async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let name = field
            .file_name()
            .and_then(|n| Path::new(n).file_name())
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("every uploaded file needs a file name"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read {}: {}", name, e)))?;
        files.push((name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(bad_request("no files provided in field 'files'"));
    }
    if let Some((name, _)) = files.iter().find(|(name, _)| !is_supported(Path::new(name))) {
        return Err(bad_request(format!(
            "unsupported file type: {} (allowed: {})",
            name,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    let mut pipeline = state.pipeline.write().await;
    if !pipeline.status().initialized {
        return Err(PipelineError::NotInitialized(pipeline.state()).into());
    }
    let documents_dir = pipeline.documents_path().to_path_buf();
    tokio::fs::create_dir_all(&documents_dir)
        .await
        .map_err(|source| PipelineError::Storage {
            path: documents_dir.clone(),
            source,
        })?;

    let mut saved: Vec<PathBuf> = Vec::with_capacity(files.len());
    for (name, bytes) in &files {
        let path = documents_dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| PipelineError::Storage {
                path: path.clone(),
                source,
            })?;
        saved.push(path);
    }

    let report = pipeline.add_documents(&saved).await?;
    info!(
        uploaded = report.added.len(),
        failed = report.failed.len(),
        "upload indexed"
    );

    Ok(Json(UploadResponse {
        message: format!("Successfully uploaded {} files", report.added.len()),
        files_uploaded: report.added.into_iter().map(|f| f.source_path).collect(),
        failed: report.failed.iter().map(|e| e.to_string()).collect(),
        total_documents: report.total_chunks,
    }))
}

// ============ POST /rebuild ============

#[derive(Serialize)]
struct RebuildResponse {
    message: String,
    total_documents: usize,
}

async fn handle_rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let total_documents = state.pipeline.write().await.rebuild().await?;
    Ok(Json(RebuildResponse {
        message: "Index rebuilt successfully".to_string(),
        total_documents,
    }))
}
