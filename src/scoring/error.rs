use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Missing audio file")]
    MissingAudio,

    /// The multipart body could not be read, e.g. it exceeds the upload cap.
    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Scoring failed: {message}")]
    Scoring {
        message: String,
        transcript: String,
        wpm: f64,
    },
}

impl IntoResponse for ScoreError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ScoreError::MissingAudio => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ScoreError::Upload { status, .. } => {
                (status, Json(json!({ "error": message }))).into_response()
            }
            ScoreError::Transcription(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),
            ScoreError::Scoring {
                transcript, wpm, ..
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message, "transcript": transcript, "wpm": wpm })),
            )
                .into_response(),
        }
    }
}

impl From<MultipartError> for ScoreError {
    fn from(e: MultipartError) -> Self {
        ScoreError::Upload {
            status: e.status(),
            message: e.body_text(),
        }
    }
}
