//! Shared config utilities for loading/saving JSON config files
//! and resolving API keys from fields or environment variables,
//! plus the pipeline's own tunable configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "[{}] loaded config", label);
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "[{}] failed to parse config — using defaults",
                    label
                );
                T::default()
            }
        },
        Err(_) => {
            tracing::info!(path = %path.display(), "[{}] no config file — using defaults", label);
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize config: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("failed to write config file: {}", e))?;
    tracing::info!(path = %path.display(), "[{}] saved config", label);
    Ok(())
}

/// Resolve an API key: check the direct `api_key` field first,
/// then fall back to reading the environment variable named in `api_key_env`.
pub fn resolve_api_key(api_key: &Option<String>, api_key_env: &Option<String>) -> Option<String> {
    if let Some(ref key) = api_key {
        if !key.is_empty() {
            return Some(key.clone());
        }
    }
    if let Some(ref env_var) = api_key_env {
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Some(key);
            }
        }
    }
    None
}

/// Tunable constants for the transcription pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_provider_limit_bytes")]
    pub provider_limit_bytes: u64,
    #[serde(default = "default_segment_duration_secs")]
    pub segment_duration_secs: u64,
    #[serde(default = "default_concurrent_limit")]
    pub concurrent_limit: usize,
    #[serde(default = "default_upload_cap_bytes")]
    pub upload_cap_bytes: u64,
    #[serde(default = "default_default_deadline_secs")]
    pub default_deadline_secs: u64,
    #[serde(default = "default_max_deadline_secs")]
    pub max_deadline_secs: u64,
    #[serde(default = "default_transcoder_binary")]
    pub transcoder_binary: String,

    pub stt_api_key: Option<String>,
    #[serde(default = "default_stt_api_key_env")]
    pub stt_api_key_env: Option<String>,
    #[serde(default = "default_stt_base_url")]
    pub stt_base_url: Option<String>,
    #[serde(default = "default_stt_model")]
    pub stt_model: Option<String>,

    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_api_key_env")]
    pub llm_api_key_env: Option<String>,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: Option<String>,
    #[serde(default = "default_llm_model")]
    pub llm_model: Option<String>,
}

fn default_provider_limit_bytes() -> u64 {
    25 * 1024 * 1024
}
fn default_segment_duration_secs() -> u64 {
    300
}
fn default_concurrent_limit() -> usize {
    3
}
fn default_upload_cap_bytes() -> u64 {
    32 * 1024 * 1024
}
fn default_default_deadline_secs() -> u64 {
    30 * 60
}
fn default_max_deadline_secs() -> u64 {
    60 * 60
}
fn default_transcoder_binary() -> String {
    "ffmpeg".to_string()
}
fn default_stt_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}
fn default_stt_base_url() -> Option<String> {
    Some("https://api.openai.com/v1".to_string())
}
fn default_stt_model() -> Option<String> {
    Some("whisper-1".to_string())
}
fn default_llm_api_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}
fn default_llm_base_url() -> Option<String> {
    Some("https://api.openai.com/v1".to_string())
}
fn default_llm_model() -> Option<String> {
    Some("gpt-4o-mini".to_string())
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_limit_bytes: default_provider_limit_bytes(),
            segment_duration_secs: default_segment_duration_secs(),
            concurrent_limit: default_concurrent_limit(),
            upload_cap_bytes: default_upload_cap_bytes(),
            default_deadline_secs: default_default_deadline_secs(),
            max_deadline_secs: default_max_deadline_secs(),
            transcoder_binary: default_transcoder_binary(),
            stt_api_key: None,
            stt_api_key_env: default_stt_api_key_env(),
            stt_base_url: default_stt_base_url(),
            stt_model: default_stt_model(),
            llm_api_key: None,
            llm_api_key_env: default_llm_api_key_env(),
            llm_base_url: default_llm_base_url(),
            llm_model: default_llm_model(),
        }
    }
}

impl PipelineConfig {
    pub fn resolve_stt_api_key(&self) -> Option<String> {
        resolve_api_key(&self.stt_api_key, &self.stt_api_key_env)
    }

    pub fn resolve_llm_api_key(&self) -> Option<String> {
        resolve_api_key(&self.llm_api_key, &self.llm_api_key_env)
    }
}

pub fn load_pipeline_config(path: &Path) -> PipelineConfig {
    load_json_config(path, "Pipeline")
}

pub fn save_pipeline_config(path: &Path, config: &PipelineConfig) -> Result<(), String> {
    save_json_config(path, config, "Pipeline")
}
