//! JSON HTTP front end for the assistant, plus the background scheduler.
//!
//! Provides [`router`] for the chat, document upload and health endpoints, and
//! [`serve`], which runs the router and the scheduler tasks until Ctrl-C.

use anyhow::Result;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::chat::Turn;
use crate::context::AppContext;
use crate::scheduler;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file: String,
    pub documents: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
    pub memory_backend: &'static str,
    pub retrieval: bool,
    pub documents: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{}", .0.body_text())]
    Upload(#[from] MultipartError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upload(e) => e.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": format!("{self:#}") }))).into_response()
    }
}

pub fn router(ctx: AppContext) -> Router {
    let body_limit = ctx.config.server.max_upload_bytes;
    Router::new()
        .route("/api/chat", post(chat))
        .route("/api/documents", post(upload_document))
        .route("/api/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn chat(State(ctx): State<AppContext>, Json(req): Json<ChatRequest>) -> Json<ChatResponse> {
    let reply = ctx.chat.respond(&req.message, &req.history).await;
    Json(ChatResponse { reply })
}

async fn upload_document(
    State(ctx): State<AppContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let rag = ctx
        .retrieval
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("retrieval is disabled".into()))?;
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("file field has no file name".into()))?;
        let bytes = field.bytes().await?;

        let dest = rag
            .store_upload(&name, &bytes)
            .await
            .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
        return Ok(Json(UploadResponse {
            file: dest.to_string_lossy().into_owned(),
            documents: rag.document_count(),
        }));
    }

    Err(ApiError::BadRequest("Missing file".into()))
}

async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        model: ctx.model.model_name().to_string(),
        memory_backend: ctx.profile.backend(),
        retrieval: ctx.retrieval.as_ref().is_some_and(|r| r.is_ready()),
        documents: ctx.retrieval.as_ref().map_or(0, |r| r.document_count()),
    })
}

/// Serve the assistant API and run the scheduler until Ctrl-C.
pub async fn serve(ctx: AppContext) -> Result<()> {
    let bind_addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    tracing::info!(addr = %bind_addr, "starting alter API server");

    let token = CancellationToken::new();
    let tasks = scheduler::spawn_all(&ctx, &token);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "API listening at http://{bind_addr}/api");

    let shutdown = token.clone();
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down API server");
            shutdown.cancel();
        })
        .await?;

    token.cancel();
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}

/// Run only the scheduler until Ctrl-C.
pub async fn run_scheduler(ctx: AppContext) -> Result<()> {
    let token = CancellationToken::new();
    let tasks = scheduler::spawn_all(&ctx, &token);
    if tasks.is_empty() {
        tracing::warn!("reminder and summary are both disabled, nothing to run");
        return Ok(());
    }
    tracing::info!(tasks = tasks.len(), "scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("stopping scheduler");
    token.cancel();
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
