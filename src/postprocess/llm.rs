//! Spelling/grammar pass, best-effort and optional.
//!
//! `LlmProvider` + `OpenAIChatProvider` mirror
//! `llm/provider.rs::LlmProvider` and `llm/openai.rs::OpenAIClient`,
//! trimmed to the one-shot, non-streaming `chat` call this pass needs (no
//! `chat_stream`, no multimodal `MessageContent` — this pipeline never
//! sends images to the corrector).

use crate::job_log::JobLog;
use crate::types::{MergedTranscript, Segment};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_SEGMENTS_SENT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, String>;
}

pub struct OpenAIChatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIChatProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[async_trait]
impl LlmProvider for OpenAIChatProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &messages,
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("provider error: {}", text));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| format!("failed to parse response: {}", e))?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "response missing choices[0].message.content".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct CorrectedSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
struct CorrectionResponse {
    #[serde(rename = "correctedText")]
    corrected_text: String,
    #[serde(rename = "correctedSegments", default)]
    corrected_segments: Vec<CorrectedSegment>,
    #[serde(default)]
    corrections: Vec<Correction>,
    #[serde(rename = "hasErrors", default)]
    has_errors: bool,
}

fn build_prompt(transcript: &MergedTranscript) -> Vec<ChatMessage> {
    let mut labeled_segments = String::new();
    for (i, segment) in transcript.segments.iter().take(MAX_SEGMENTS_SENT).enumerate() {
        labeled_segments.push_str(&format!(
            "[{}] {:.2}-{:.2}: {}\n",
            i, segment.start, segment.end, segment.text
        ));
    }

    let system = ChatMessage::system(
        "You correct spelling and grammar in a speech transcript. Respond with a \
         single JSON object with keys correctedText (string), correctedSegments \
         (array of {start, end, text} with start/end copied unchanged from the \
         input), corrections (array of {original, corrected, reason}), and \
         hasErrors (boolean). Do not change start/end values. Do not add or \
         remove segments.",
    );
    let user = ChatMessage::user(format!(
        "Full text:\n{}\n\nSegments:\n{}",
        transcript.text, labeled_segments
    ));

    vec![system, user]
}

fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end_matches("```").trim())
        .unwrap_or(trimmed)
}

/// Run the spelling/grammar pass, mutating `transcript` in place on
/// success. Any failure (transport, parse, or a provider that violates the
/// start/end-preservation contract) is logged and swallowed — the original
/// transcript is left untouched.
pub async fn run_spelling_pass(
    provider: &dyn LlmProvider,
    transcript: &mut MergedTranscript,
    job_id: &str,
    log: &JobLog,
) {
    let messages = build_prompt(transcript);

    let raw_response = match provider.chat(messages).await {
        Ok(r) => r,
        Err(e) => {
            log.warn(job_id, "postprocess", format!("spelling pass request failed: {}", e))
                .await;
            return;
        }
    };

    let parsed: CorrectionResponse = match serde_json::from_str(extract_json(&raw_response)) {
        Ok(p) => p,
        Err(e) => {
            log.warn(job_id, "postprocess", format!("spelling pass returned unparsable JSON: {}", e))
                .await;
            return;
        }
    };

    if apply_corrections(transcript, &parsed).is_err() {
        log.warn(
            job_id,
            "postprocess",
            "spelling pass response violated start/end preservation, discarding",
        )
        .await;
        return;
    }

    if parsed.has_errors {
        log.info(job_id, "postprocess", format!("spelling pass applied {} correction(s)", parsed.corrections.len()))
            .await;
    }
}

/// Merge corrected segment text back into `transcript.segments` by
/// positional index, preserving `words`/`speaker` and rejecting any
/// response that tries to move a timestamp (spec: "start/end MUST be
/// preserved unchanged").
fn apply_corrections(transcript: &mut MergedTranscript, parsed: &CorrectionResponse) -> Result<(), ()> {
    for (i, corrected) in parsed.corrected_segments.iter().enumerate() {
        let Some(existing) = transcript.segments.get(i) else {
            break;
        };
        if (corrected.start - existing.start).abs() > f64::EPSILON
            || (corrected.end - existing.end).abs() > f64::EPSILON
        {
            return Err(());
        }
    }

    for (i, corrected) in parsed.corrected_segments.iter().enumerate() {
        if let Some(existing) = transcript.segments.get_mut(i) {
            existing.text = corrected.text.clone();
        }
    }

    transcript.text = parsed.corrected_text.clone();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeLlm {
        response: Result<String, String>,
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn chat(&self, _messages: Vec<ChatMessage>) -> Result<String, String> {
            self.response.clone()
        }
    }

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
            words: vec![],
            speaker: None,
        }
    }

    fn sample_transcript() -> MergedTranscript {
        MergedTranscript {
            text: "helo wrold".to_string(),
            duration_sec: 2.0,
            language: Some("en".to_string()),
            segments: vec![seg(0.0, 1.0, "helo"), seg(1.0, 2.0, "wrold")],
            total_segments: 1,
        }
    }

    #[tokio::test]
    async fn successful_pass_replaces_text_and_preserves_timestamps() {
        let mut transcript = sample_transcript();
        let response = serde_json::json!({
            "correctedText": "hello world",
            "correctedSegments": [
                {"start": 0.0, "end": 1.0, "text": "hello"},
                {"start": 1.0, "end": 2.0, "text": "world"},
            ],
            "corrections": [{"original": "helo", "corrected": "hello", "reason": "typo"}],
            "hasErrors": true,
        })
        .to_string();
        let provider = FakeLlm { response: Ok(response) };
        let log = JobLog::new();

        run_spelling_pass(&provider, &mut transcript, "job", &log).await;

        assert_eq!(transcript.text, "hello world");
        assert_eq!(transcript.segments[0].text, "hello");
        assert_eq!(transcript.segments[0].start, 0.0);
        assert_eq!(transcript.segments[1].text, "world");
    }

    #[tokio::test]
    async fn provider_failure_leaves_transcript_unchanged() {
        let mut transcript = sample_transcript();
        let original_text = transcript.text.clone();
        let provider = FakeLlm {
            response: Err("quota exceeded".to_string()),
        };
        let log = JobLog::new();

        run_spelling_pass(&provider, &mut transcript, "job", &log).await;

        assert_eq!(transcript.text, original_text);
    }

    #[tokio::test]
    async fn response_that_moves_a_timestamp_is_rejected() {
        let mut transcript = sample_transcript();
        let original_text = transcript.text.clone();
        let response = serde_json::json!({
            "correctedText": "hello world",
            "correctedSegments": [
                {"start": 0.5, "end": 1.0, "text": "hello"},
                {"start": 1.0, "end": 2.0, "text": "world"},
            ],
            "corrections": [],
            "hasErrors": true,
        })
        .to_string();
        let provider = FakeLlm { response: Ok(response) };
        let log = JobLog::new();

        run_spelling_pass(&provider, &mut transcript, "job", &log).await;

        assert_eq!(transcript.text, original_text);
    }

    #[tokio::test]
    async fn unparsable_response_is_swallowed() {
        let mut transcript = sample_transcript();
        let original_text = transcript.text.clone();
        let provider = FakeLlm {
            response: Ok("not json at all".to_string()),
        };
        let log = JobLog::new();

        run_spelling_pass(&provider, &mut transcript, "job", &log).await;

        assert_eq!(transcript.text, original_text);
    }

    #[test]
    fn extract_json_strips_markdown_fences() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("{\"a\":1}"), "{\"a\":1}");
    }
}
