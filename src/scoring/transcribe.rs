use anyhow::{Context, Result};
use reqwest::multipart;
use serde::Deserialize;

use super::audio::mime_type;
use super::ScoringService;

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct CustomTranscript {
    text: Option<String>,
    transcript: Option<String>,
}

impl ScoringService {
    /// OpenAI speech-to-text, English.
    pub(crate) async fn transcribe_openai(&self, audio: &[u8], extension: &str) -> Result<String> {
        let api_key = self
            .config
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY not set")?;

        let part = multipart::Part::bytes(audio.to_vec())
            .file_name(format!("audio.{extension}"))
            .mime_str(mime_type(extension))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.config.transcription_model.clone())
            .text("language", "en");

        let url = format!("{}/audio/transcriptions", self.config.openai_base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("transcription request failed")?
            .error_for_status()?;

        let body: WhisperResponse = response
            .json()
            .await
            .context("failed to parse transcription response")?;
        Ok(body.text.trim().to_string())
    }

    /// User-supplied endpoint: multipart `file` in, `{text}` or `{transcript}` out.
    pub(crate) async fn transcribe_custom(&self, audio: &[u8]) -> Result<String> {
        let url = self
            .config
            .transcription_url
            .as_deref()
            .context("No TRANSCRIPTION_URL")?;

        let part = multipart::Part::bytes(audio.to_vec())
            .file_name("audio.webm")
            .mime_str("audio/webm")?;
        let form = multipart::Form::new().part("file", part);

        let mut request = self.client.post(url).multipart(form);
        if let Some(key) = &self.config.scoring_api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .context("transcription request failed")?
            .error_for_status()?;

        let body: CustomTranscript = response
            .json()
            .await
            .context("failed to parse transcription response")?;
        let text = body
            .text
            .filter(|t| !t.is_empty())
            .or(body.transcript)
            .unwrap_or_default();
        Ok(text.trim().to_string())
    }
}
