//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/frameworks` | Seed frameworks plus any imported ones |
//! | `POST` | `/ingest` | Add base64-encoded documents to the session |
//! | `POST` | `/map_controls` | Literal-match a framework's controls against ingested documents |
//! | `POST` | `/coverage` | Top policy excerpts per control of a framework |
//! | `POST` | `/query` | Answer a question from the ingested documents |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "No documents ingested" } }
//! ```
//!
//! Error codes: `bad_request` (400), `rejected_input` (400), `not_found` (404),
//! `upstream_error` (502), `internal` (500).
//!
//! The ingested documents live in one [`Session`] held by [`AppState`];
//! there is no per-client isolation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use docusec_core::coverage::check_coverage;
use docusec_core::mapper::group_controls;
use docusec_core::models::CoverageResult;
use docusec_core::provider::SearchProvider;
use docusec_core::rag::{answer_query, TextGenerator};
use docusec_core::validation::{validate_input, ValidationError};

use crate::config::Config;
use crate::controls::fetch_controls;
use crate::db;
use crate::documents::PolicyDocument;
use crate::embedding::create_embedder;
use crate::extract::extract_text;
use crate::frameworks::available_frameworks;
use crate::llm::create_generator;
use crate::migrate;
use crate::session::{Indexer, Session};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    session: Arc<RwLock<Session>>,
    indexer: Indexer,
    generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub fn new(
        config: Config,
        pool: SqlitePool,
        indexer: Indexer,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pool,
            session: Arc::new(RwLock::new(Session::new())),
            indexer,
            generator,
        }
    }
}

/// Build the router with CORS open to all origins.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/frameworks", get(handle_frameworks))
        .route("/ingest", post(handle_ingest))
        .route("/map_controls", post(handle_map_controls))
        .route("/coverage", post(handle_coverage))
        .route("/query", post(handle_query))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let indexer = Indexer::from_config(config, create_embedder(&config.embedding)?);
    let generator = create_generator(&config.llm)?;

    let bind_addr = config.server.bind.clone();
    let app = build_router(AppState::new(config.clone(), pool, indexer, generator));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "DocuSec API listening");
    println!("DocuSec API listening on http://{}", bind_addr);
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

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "rejected_input",
            message: e.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error",
        message: message.into(),
    }
}

fn internal(err: impl std::fmt::Display) -> AppError {
    warn!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

fn no_documents() -> AppError {
    bad_request("No documents ingested")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /frameworks ============

#[derive(Serialize)]
struct FrameworksResponse {
    frameworks: Vec<String>,
}

async fn handle_frameworks(
    State(state): State<AppState>,
) -> Result<Json<FrameworksResponse>, AppError> {
    let frameworks = available_frameworks(&state.pool, state.config.frameworks.seed_path.as_deref())
        .await
        .map_err(internal)?;
    Ok(Json(FrameworksResponse { frameworks }))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    files: Vec<UploadedFile>,
}

#[derive(Deserialize)]
struct UploadedFile {
    filename: String,
    /// File bytes, standard base64.
    content_base64: String,
}

#[derive(Serialize)]
struct IngestResponse {
    /// Total chunks in the session after this upload.
    chunks: usize,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    if req.files.is_empty() {
        return Err(bad_request("files must not be empty"));
    }

    let mut documents = Vec::with_capacity(req.files.len());
    for file in req.files {
        let bytes = STANDARD
            .decode(file.content_base64.as_bytes())
            .map_err(|e| bad_request(format!("{}: invalid base64: {}", file.filename, e)))?;
        let text = extract_text(&bytes, &file.filename)
            .map_err(|e| bad_request(format!("{}: {}", file.filename, e)))?;
        documents.push(PolicyDocument {
            name: file.filename,
            text,
        });
    }

    // Holding the write lock serializes uploads.
    let mut session = state.session.write().await;
    let mut next = session.clone();
    let indexer = state.indexer.clone();
    let next = tokio::task::spawn_blocking(move || -> anyhow::Result<Session> {
        next.ingest(&documents, &indexer)?;
        Ok(next)
    })
    .await
    .map_err(internal)?
    .map_err(|e| upstream_error(format!("Indexing failed: {}", e)))?;

    let chunks = next.chunks().len();
    *session = next;
    Ok(Json(IngestResponse { chunks }))
}

// ============ POST /map_controls ============

#[derive(Deserialize)]
struct FrameworkRequest {
    framework: String,
    /// Candidate budget per control; `/coverage` only.
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct MappingResponse {
    framework: String,
    matched_controls: Vec<String>,
}

async fn handle_map_controls(
    State(state): State<AppState>,
    Json(req): Json<FrameworkRequest>,
) -> Result<Json<MappingResponse>, AppError> {
    let session = state.session.read().await;
    if session.is_empty() {
        return Err(no_documents());
    }
    let controls = fetch_controls(&state.pool, Some(&req.framework))
        .await
        .map_err(internal)?;
    if controls.is_empty() {
        return Err(not_found(format!("No controls stored for framework '{}'", req.framework)));
    }

    let mut mapping = session.map(&group_controls(&controls));
    Ok(Json(MappingResponse {
        matched_controls: mapping.remove(&req.framework).unwrap_or_default(),
        framework: req.framework,
    }))
}

// ============ POST /coverage ============

#[derive(Serialize)]
struct CoverageResponse {
    framework: String,
    results: Vec<CoverageResult>,
}

async fn handle_coverage(
    State(state): State<AppState>,
    Json(req): Json<FrameworkRequest>,
) -> Result<Json<CoverageResponse>, AppError> {
    let index = state.session.read().await.index().ok_or_else(no_documents)?;
    let controls = fetch_controls(&state.pool, Some(&req.framework))
        .await
        .map_err(internal)?;
    if controls.is_empty() {
        return Err(not_found(format!("No controls stored for framework '{}'", req.framework)));
    }
    let k = req.k.unwrap_or(state.config.retrieval.candidate_k).max(1);

    let results = tokio::task::spawn_blocking(move || {
        check_coverage(Some(index.as_ref() as &dyn SearchProvider), &controls, k)
    })
    .await
    .map_err(internal)?;

    Ok(Json(CoverageResponse {
        framework: req.framework,
        results,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    validate_input(&req.query)?;
    let index = state.session.read().await.index().ok_or_else(no_documents)?;
    let generator = state.generator.clone();
    let k = state.config.retrieval.answer_k;

    let answer = tokio::task::spawn_blocking(move || {
        answer_query(index.as_ref(), generator.as_ref(), &req.query, k)
    })
    .await
    .map_err(internal)?
    .map_err(|e| upstream_error(e.to_string()))?;

    Ok(Json(QueryResponse { answer }))
}
