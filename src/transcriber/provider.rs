//! `SttProvider` — injectable speech-to-text backend.
//!
//! Follows `stt/interface.rs::SttEngine`'s trait shape and
//! `stt/openai.rs`'s multipart request construction.

use crate::error::{ProviderErrorClass, SttError};
use crate::types::RawTranscript;
use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;

/// Parameters that shape the provider request, independent of which
/// provider implementation handles it.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub language: Option<String>,
    pub prompt: String,
}

#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Transcribe the audio file at `path`. Implementations must re-read
    /// the file from disk on every call so retries get a fresh stream
    /// rather than replaying a consumed buffer.
    async fn transcribe(
        &self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<RawTranscript, SttError>;
}

pub struct OpenAIWhisperProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIWhisperProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VerboseJsonWord {
    word: String,
    start: f64,
    end: f64,
}

#[derive(Debug, Deserialize)]
struct VerboseJsonSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    words: Option<Vec<VerboseJsonWord>>,
}

#[derive(Debug, Deserialize)]
struct VerboseJsonResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Option<Vec<VerboseJsonSegment>>,
}

impl From<VerboseJsonResponse> for RawTranscript {
    fn from(resp: VerboseJsonResponse) -> Self {
        let segments = resp
            .segments
            .unwrap_or_default()
            .into_iter()
            .map(|s| crate::types::Segment {
                start: s.start,
                end: s.end,
                text: s.text,
                words: s
                    .words
                    .unwrap_or_default()
                    .into_iter()
                    .map(|w| crate::types::Word {
                        word: w.word,
                        start: w.start,
                        end: w.end,
                    })
                    .collect(),
                speaker: None,
            })
            .collect();

        RawTranscript {
            text: resp.text,
            duration_sec: resp.duration.unwrap_or(0.0),
            language: resp.language,
            segments,
        }
    }
}

fn classify_status(status: StatusCode) -> ProviderErrorClass {
    match status.as_u16() {
        429 => ProviderErrorClass::RateLimit,
        402 => ProviderErrorClass::QuotaExhausted,
        401 => ProviderErrorClass::AuthInvalid,
        403 => ProviderErrorClass::Forbidden,
        _ => ProviderErrorClass::Fatal,
    }
}

#[async_trait]
impl SttProvider for OpenAIWhisperProvider {
    async fn transcribe(
        &self,
        path: &Path,
        options: &TranscribeOptions,
    ) -> Result<RawTranscript, SttError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            SttError::new(
                ProviderErrorClass::NetworkError,
                format!("failed to read input file: {}", e),
            )
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let file_part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("application/octet-stream")
            .map_err(|e| SttError::new(ProviderErrorClass::Fatal, format!("mime error: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("prompt", options.prompt.clone());

        if let Some(lang) = &options.language {
            form = form.text("language", lang.clone());
        }

        let url = format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                let class = if e.is_timeout() || e.is_connect() {
                    ProviderErrorClass::PossibleQuotaOrNetwork
                } else {
                    ProviderErrorClass::NetworkError
                };
                SttError::new(class, format!("transport error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let class = classify_status(status);
            let body = response.text().await.unwrap_or_default();
            return Err(SttError::new(
                class,
                format!("provider returned {}: {}", status, body),
            ));
        }

        let parsed: VerboseJsonResponse = response.json().await.map_err(|e| {
            SttError::new(
                ProviderErrorClass::Fatal,
                format!("failed to parse provider response: {}", e),
            )
        })?;

        Ok(parsed.into())
    }
}
