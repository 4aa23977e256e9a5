use alter::config::ScoringConfig;
use alter::scoring::{server::router, ScoringService};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header as header_is, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "alter-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn score_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::post("/api/score")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn app(config: ScoringConfig, static_dir: &std::path::Path) -> axum::Router {
    router(Arc::new(ScoringService::new(config).unwrap()), static_dir)
}

/// 16 kHz mono 16-bit PCM of the given length, all silence.
fn wav(seconds: u32) -> Vec<u8> {
    let data_len = 16_000 * 2 * seconds;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&16_000u32.to_le_bytes());
    out.extend_from_slice(&32_000u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}

#[tokio::test]
async fn missing_audio_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let response = app(ScoringConfig::default(), dir.path())
        .oneshot(score_request(&[Part::Text("task", "2")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Missing audio file"}));
}

#[tokio::test]
async fn non_multipart_body_is_missing_audio() {
    let dir = TempDir::new().unwrap();
    let request = Request::post("/api/score")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app(ScoringConfig::default(), dir.path()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Missing audio file"}));
}

#[tokio::test]
async fn no_credentials_fails_transcription() {
    let dir = TempDir::new().unwrap();
    let response = app(ScoringConfig::default(), dir.path())
        .oneshot(score_request(&[Part::File("audio", "answer.webm", b"webm-bytes")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Transcription failed: No OPENAI_API_KEY or TOEFL_TRANSCRIPTION_URL"})
    );
}

#[tokio::test]
async fn openai_transcription_and_scoring_success() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .and(header_is("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "  I prefer studying in the library because it is quiet  "
        })))
        .mount(&openai)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 150})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "```json\n{\"score\": 3, \"reason\": \"Clear but brief.\"}\n```"}}]
        })))
        .mount(&openai)
        .await;

    let config = ScoringConfig {
        openai_api_key: Some("sk-test".into()),
        openai_base_url: openai.uri(),
        ..ScoringConfig::default()
    };
    let dir = TempDir::new().unwrap();
    let audio = wav(6);
    let response = app(config, dir.path())
        .oneshot(score_request(&[
            Part::Text("task", "3"),
            Part::File("audio", "answer.WAV", &audio),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["score"], 3);
    assert_eq!(body["reason"], "Clear but brief.");
    assert_eq!(body["transcript"], "I prefer studying in the library because it is quiet");
    assert_eq!(body["duration_sec"], 6.0);
    assert_eq!(body["word_count"], 10);
    assert_eq!(body["wpm"], 100.0);
}

#[tokio::test]
async fn claude_is_preferred_and_bad_reply_reports_scoring_failure() {
    let openai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "one two three"})))
        .mount(&openai)
        .await;

    let anthropic = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header_is("x-api-key", "sk-ant-test"))
        .and(header_is("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "I'd say about a two."}]
        })))
        .expect(1)
        .mount(&anthropic)
        .await;

    let config = ScoringConfig {
        openai_api_key: Some("sk-test".into()),
        anthropic_api_key: Some("sk-ant-test".into()),
        openai_base_url: openai.uri(),
        anthropic_base_url: anthropic.uri(),
        ..ScoringConfig::default()
    };
    let dir = TempDir::new().unwrap();
    let response = app(config, dir.path())
        .oneshot(score_request(&[Part::File("audio", "answer.webm", b"not a wav")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    // unknown duration falls back to 30s: 3 words -> 6 wpm
    assert_eq!(
        json_body(response).await,
        json!({
            "error": "Scoring failed: No valid JSON score in response",
            "transcript": "one two three",
            "wpm": 6.0
        })
    );
}

#[tokio::test]
async fn custom_endpoints_are_used_without_provider_keys() {
    let custom = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/transcribe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"transcript": "hello there"})))
        .mount(&custom)
        .await;
    Mock::given(method("POST"))
        .and(path("/score"))
        .and(body_partial_json(json!({"task": 1, "transcript": "hello there", "word_count": 2})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"score": "4", "reason": "fine"})))
        .mount(&custom)
        .await;

    let config = ScoringConfig {
        transcription_url: Some(format!("{}/transcribe", custom.uri())),
        scoring_url: Some(format!("{}/score", custom.uri())),
        ..ScoringConfig::default()
    };
    let dir = TempDir::new().unwrap();
    let response = app(config, dir.path())
        .oneshot(score_request(&[
            Part::Text("task", "9"),
            Part::File("audio", "clip.flac", b"flac"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["score"], 4);
    assert_eq!(body["reason"], "fine");
    assert_eq!(body["duration_sec"], 30.0);
}

#[tokio::test]
async fn health_reports_backends() {
    let dir = TempDir::new().unwrap();
    let config = ScoringConfig {
        anthropic_api_key: Some("sk-ant".into()),
        transcription_url: Some("http://localhost:9/t".into()),
        ..ScoringConfig::default()
    };
    let response = app(config, dir.path())
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"ok": true, "transcription": "custom", "scoring": "claude"})
    );
}

#[tokio::test]
async fn rubric_lists_levels_and_conversion() {
    let dir = TempDir::new().unwrap();
    let response = app(ScoringConfig::default(), dir.path())
        .oneshot(Request::get("/api/rubric").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["levels"].as_array().unwrap().len(), 5);
    assert_eq!(body["conversion"][16], json!({"raw": 16, "scaled": 30}));
}

#[tokio::test]
async fn static_files_are_served_from_the_static_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>practice</h1>").unwrap();

    let response = app(ScoringConfig::default(), dir.path())
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>practice</h1>");

    let missing = app(ScoringConfig::default(), dir.path())
        .oneshot(Request::get("/js/app.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recordings_over_two_megabytes_reach_transcription() {
    let dir = TempDir::new().unwrap();
    // 70 s of 16 kHz mono is past axum's default 2 MB body limit
    let audio = wav(70);
    assert!(audio.len() > 2 * 1024 * 1024);

    let response = app(ScoringConfig::default(), dir.path())
        .oneshot(score_request(&[Part::File("audio", "answer.wav", &audio)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Transcription failed: No OPENAI_API_KEY or TOEFL_TRANSCRIPTION_URL"})
    );
}

#[tokio::test]
async fn upload_over_the_configured_cap_is_payload_too_large() {
    let dir = TempDir::new().unwrap();
    let config = ScoringConfig {
        max_upload_bytes: 64 * 1024,
        ..ScoringConfig::default()
    };
    let audio = wav(3);

    let response = app(config, dir.path())
        .oneshot(score_request(&[
            Part::Text("task", "2"),
            Part::File("audio", "answer.wav", &audio),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_body(response).await;
    assert_ne!(body["error"], "Missing audio file");
}
