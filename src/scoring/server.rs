//! HTTP surface of the scorer: `/api/score`, `/api/health`, `/api/rubric` and static files.

use anyhow::Result;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::audio::{normalize_extension, parse_task};
use super::rubric::{rubric, Rubric};
use super::{Health, ScoreError, ScoreReport, ScoringService};
use crate::config::ScoringConfig;

pub fn router(service: Arc<ScoringService>, static_dir: impl AsRef<Path>) -> Router {
    let body_limit = service.config().max_upload_bytes;
    Router::new()
        .route("/api/score", post(score))
        .route("/api/health", get(health))
        .route("/api/rubric", get(rubric_handler))
        .fallback_service(ServeDir::new(static_dir.as_ref()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn score(
    State(service): State<Arc<ScoringService>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ScoreReport>, ScoreError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "score request is not multipart");
        ScoreError::MissingAudio
    })?;

    let mut audio: Option<(Option<String>, Vec<u8>)> = None;
    let mut task: Option<String> = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                audio = Some((file_name, bytes.to_vec()));
            }
            "task" => task = Some(field.text().await?),
            _ => {}
        }
    }

    let task = parse_task(task.as_deref());
    let (file_name, bytes) = audio.ok_or(ScoreError::MissingAudio)?;
    let extension = normalize_extension(file_name.as_deref());
    tracing::info!(task, extension, bytes = bytes.len(), "scoring answer");

    let report = service.score(task, &bytes, extension).await.inspect_err(|e| {
        tracing::warn!(error = %e, "scoring request failed");
    })?;
    Ok(Json(report))
}

async fn health(State(service): State<Arc<ScoringService>>) -> Json<Health> {
    Json(service.health())
}

async fn rubric_handler() -> Json<Rubric> {
    Json(rubric())
}

/// Run the scorer until Ctrl-C.
pub async fn serve(config: ScoringConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let static_dir = config.static_dir.clone();
    let service = Arc::new(ScoringService::new(config)?);

    let health = service.health();
    tracing::info!(
        transcription = health.transcription,
        scoring = health.scoring,
        static_dir = %static_dir,
        "scoring backends"
    );

    let app = router(service, &static_dir);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "scoring server listening at http://{bind_addr}/");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down scoring server");
        })
        .await?;

    Ok(())
}
