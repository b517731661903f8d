//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness plus initialization state |
//! | `POST` | `/initialize` | Ingest the documents directory |
//! | `POST` | `/ask` | Answer a question |
//! | `GET`  | `/documents` | Per-document chunk counts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question: must be at least 5 characters", "field": "question" } }
//! ```
//!
//! Error codes: `bad_request` (400), `ingestion_in_progress` (409),
//! `ingestion_failed` (500), `retrieval_failed` (502),
//! `generation_failed` (502), `not_initialized` (503).

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use medrag_core::models::{QueryRequest, QueryResponse};

use crate::config::Config;
use crate::error::RagError;
use crate::rag::{DocumentsReport, HealthReport, InitializeReport, RagService};

/// Build the router over a shared service.
pub fn router(service: Arc<RagService>, body_limit_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/initialize", post(handle_initialize))
        .route("/ask", post(handle_ask))
        .route("/documents", get(handle_documents))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors)
        .with_state(service)
}

/// Bind `[server].bind` and serve until Ctrl-C.
pub async fn run_server(config: &Config, service: Arc<RagService>) -> anyhow::Result<()> {
    let app = router(service, config.server.body_limit_bytes);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
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
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                field: self.field,
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
        field: None,
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Validation { .. } => StatusCode::BAD_REQUEST,
            RagError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            RagError::AlreadyInitialized | RagError::IngestionInProgress => StatusCode::CONFLICT,
            RagError::Ingestion(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RagError::Retrieval(_) | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        let field = match &err {
            RagError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        if status.is_server_error() {
            warn!(code = err.code(), error = %err, "Request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
            field,
        }
    }
}

// ============ Handlers ============

async fn handle_health(State(service): State<Arc<RagService>>) -> Json<HealthReport> {
    Json(service.health())
}

#[derive(Serialize)]
struct InitializeResponse {
    message: &'static str,
    #[serde(flatten)]
    report: Option<InitializeReport>,
}

/// Re-initializing is not an error: it answers 200 with a message.
async fn handle_initialize(
    State(service): State<Arc<RagService>>,
) -> Result<Json<InitializeResponse>, AppError> {
    match service.initialize().await {
        Ok(report) => Ok(Json(InitializeResponse {
            message: "System initialized successfully",
            report: Some(report),
        })),
        Err(RagError::AlreadyInitialized) => Ok(Json(InitializeResponse {
            message: "System already initialized",
            report: None,
        })),
        Err(e) => Err(e.into()),
    }
}

/// The readiness check comes before body validation.
async fn handle_ask(
    State(service): State<Arc<RagService>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    if !service.is_initialized() {
        return Err(RagError::NotInitialized.into());
    }
    let Json(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    let response = service.ask(request).await?;
    Ok(Json(response))
}

async fn handle_documents(State(service): State<Arc<RagService>>) -> Json<DocumentsReport> {
    Json(service.documents())
}
