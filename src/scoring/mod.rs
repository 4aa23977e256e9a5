//! TOEFL speaking practice scorer.
//!
//! An audio answer is transcribed, measured (duration, word count, words per
//! minute) and graded 0-4 against the ETS rubric by a hosted model. Both the
//! transcription and the grading backend are picked from the credentials
//! present in the environment; missing credentials surface as request
//! failures, never at startup.

pub mod audio;
pub mod error;
pub mod grader;
pub mod rubric;
pub mod server;
mod transcribe;

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

use crate::config::ScoringConfig;
pub use error::ScoreError;
pub use grader::{Answer, Grade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionBackend {
    Custom,
    OpenAi,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringBackend {
    Claude,
    OpenAi,
    Custom,
}

impl TranscriptionBackend {
    pub fn select(config: &ScoringConfig) -> Self {
        if config.transcription_url.is_some() {
            Self::Custom
        } else if config.openai_api_key.is_some() {
            Self::OpenAi
        } else {
            Self::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Custom => "custom",
            Self::OpenAi => "openai",
            Self::None => "none",
        }
    }
}

impl ScoringBackend {
    /// Claude first; a custom endpoint only when OpenAI is not configured.
    pub fn select(config: &ScoringConfig) -> Self {
        if config.anthropic_api_key.is_some() {
            Self::Claude
        } else if config.scoring_url.is_some() && config.openai_api_key.is_none() {
            Self::Custom
        } else if config.openai_api_key.is_some() {
            Self::OpenAi
        } else {
            Self::Custom
        }
    }

    /// Name reported by the health check; an unconfigured custom backend is `"none"`.
    pub fn name(&self, config: &ScoringConfig) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::OpenAi => "openai",
            Self::Custom if config.scoring_url.is_some() => "custom",
            Self::Custom => "none",
        }
    }
}

/// Successful scoring response body.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreReport {
    pub score: u8,
    pub reason: String,
    pub transcript: String,
    pub duration_sec: f64,
    pub word_count: usize,
    pub wpm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub ok: bool,
    pub transcription: &'static str,
    pub scoring: &'static str,
}

pub struct ScoringService {
    config: ScoringConfig,
    client: reqwest::Client,
}

impl ScoringService {
    pub fn new(config: ScoringConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn health(&self) -> Health {
        Health {
            ok: true,
            transcription: TranscriptionBackend::select(&self.config).name(),
            scoring: ScoringBackend::select(&self.config).name(&self.config),
        }
    }

    pub async fn transcribe(&self, audio: &[u8], extension: &str) -> Result<String> {
        match TranscriptionBackend::select(&self.config) {
            TranscriptionBackend::Custom => self.transcribe_custom(audio).await,
            TranscriptionBackend::OpenAi => self.transcribe_openai(audio, extension).await,
            TranscriptionBackend::None => {
                anyhow::bail!("No OPENAI_API_KEY or TOEFL_TRANSCRIPTION_URL")
            }
        }
    }

    pub async fn grade(&self, answer: &Answer<'_>) -> Result<Grade> {
        match ScoringBackend::select(&self.config) {
            ScoringBackend::Claude => self.grade_claude(answer).await,
            ScoringBackend::OpenAi => self.grade_openai(answer).await,
            ScoringBackend::Custom => self.grade_custom(answer).await,
        }
    }

    /// Transcribe, measure and grade one answer.
    pub async fn score(&self, task: u8, audio: &[u8], extension: &str) -> Result<ScoreReport, ScoreError> {
        let transcript = self
            .transcribe(audio, extension)
            .await
            .map_err(|e| ScoreError::Transcription(format!("{e:#}")))?;

        let duration_secs = audio::duration_or_default(audio, extension);
        let word_count = audio::word_count(&transcript);
        let wpm = audio::words_per_minute(word_count, duration_secs);
        tracing::info!(task, word_count, duration_secs, wpm, "answer transcribed");

        let answer = Answer {
            task,
            transcript: &transcript,
            duration_secs,
            word_count,
            wpm,
        };
        let grade = match self.grade(&answer).await {
            Ok(grade) => grade,
            Err(e) => {
                return Err(ScoreError::Scoring {
                    message: format!("{e:#}"),
                    transcript,
                    wpm: audio::round1(wpm),
                })
            }
        };

        Ok(ScoreReport {
            score: grade.score,
            reason: grade.reason,
            transcript,
            duration_sec: audio::round1(duration_secs),
            word_count,
            wpm: audio::round1(wpm),
        })
    }
}
