use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use super::ScoringService;

/// Condensed ETS 0-4 rubric sent as the grading instruction.
pub const RUBRIC_SHORT: &str = "Score 0-4 only. ETS: 4=fully addresses task, clear, fluent, minor errors. \
3=generally good, some issues. 2=partial, limited clarity/development. \
1=serious problems, hard to follow. 0=off-topic or no speech. \
Reply with JSON only: {\"score\":0-4,\"reason\":\"one short sentence\"}";

const MAX_TRANSCRIPT_CHARS: usize = 2000;

/// Numbers describing one spoken answer.
#[derive(Debug, Clone)]
pub struct Answer<'a> {
    pub task: u8,
    pub transcript: &'a str,
    pub duration_secs: f64,
    pub word_count: usize,
    pub wpm: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub score: u8,
    pub reason: String,
}

pub fn user_prompt(answer: &Answer<'_>) -> String {
    let transcript: String = answer.transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();
    format!(
        "Task {}. Transcript: \"{}\" Duration: {:.0}s. Words: {}. WPM: {:.0}. \
         Reply with JSON only: {{\"score\":0-4,\"reason\":\"one short sentence\"}}",
        answer.task, transcript, answer.duration_secs, answer.word_count, answer.wpm
    )
}

/// Score from a JSON value: an integer, a whole-number float, or a numeric string, 0-4.
fn score_value(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (0..=4).contains(&n).then_some(n as u8)
}

fn reason_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Find the first line of a model reply that is a JSON object with a valid score.
///
/// Lines are trimmed of whitespace and code-fence backticks. A line that starts
/// with `{` but is not valid JSON is an error.
pub fn parse_grade_reply(text: &str) -> Result<Grade> {
    for line in text.trim().lines() {
        let line = line.trim().trim_matches('`');
        if !line.starts_with('{') {
            continue;
        }
        let obj: Value = serde_json::from_str(line)?;
        if let Some(score) = obj.get("score").and_then(score_value) {
            return Ok(Grade {
                score,
                reason: reason_value(obj.get("reason")),
            });
        }
    }
    bail!("No valid JSON score in response")
}

#[derive(Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeBlock>,
}

#[derive(Deserialize)]
struct ClaudeBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

impl ScoringService {
    pub(crate) async fn grade_claude(&self, answer: &Answer<'_>) -> Result<Grade> {
        let api_key = self
            .config
            .anthropic_api_key
            .as_deref()
            .context("ANTHROPIC_API_KEY not set")?;

        let body = json!({
            "model": self.config.claude_model,
            "max_tokens": 150,
            "system": RUBRIC_SHORT,
            "messages": [{ "role": "user", "content": user_prompt(answer) }],
        });
        let url = format!("{}/messages", self.config.anthropic_base_url.trim_end_matches('/'));
        let response: ClaudeResponse = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("scoring request failed")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse scoring response")?;

        let text = response.content.first().map(|b| b.text.as_str()).unwrap_or("");
        parse_grade_reply(text)
    }

    pub(crate) async fn grade_openai(&self, answer: &Answer<'_>) -> Result<Grade> {
        let api_key = self
            .config
            .openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY not set")?;

        let body = json!({
            "model": self.config.openai_model,
            "messages": [
                { "role": "system", "content": RUBRIC_SHORT },
                { "role": "user", "content": user_prompt(answer) },
            ],
            "max_tokens": 150,
            "temperature": 0.2,
        });
        let url = format!("{}/chat/completions", self.config.openai_base_url.trim_end_matches('/'));
        let response: OpenAiResponse = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("scoring request failed")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse scoring response")?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or("");
        parse_grade_reply(text)
    }

    /// User-supplied endpoint: JSON answer stats in, `{score, reason}` out.
    pub(crate) async fn grade_custom(&self, answer: &Answer<'_>) -> Result<Grade> {
        let url = self
            .config
            .scoring_url
            .as_deref()
            .ok_or_else(|| anyhow!("No SCORING_URL"))?;

        let payload = json!({
            "task": answer.task,
            "transcript": answer.transcript,
            "duration_sec": answer.duration_secs,
            "word_count": answer.word_count,
            "wpm": answer.wpm,
            "rubric_hint": RUBRIC_SHORT,
        });
        let mut request = self.client.post(url).json(&payload);
        if let Some(key) = &self.config.scoring_api_key {
            request = request.bearer_auth(key);
        }
        let data: Value = request
            .send()
            .await
            .context("scoring request failed")?
            .error_for_status()?
            .json()
            .await
            .context("failed to parse scoring response")?;

        let score = data
            .get("score")
            .and_then(score_value)
            .ok_or_else(|| anyhow!("Invalid score in response"))?;
        Ok(Grade {
            score,
            reason: reason_value(data.get("reason")),
        })
    }
}
