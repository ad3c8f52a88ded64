//! Shared domain types for the transcription pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which container role a file on disk is playing for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactRole {
    Original,
    Transcoded,
    Segment,
}

/// A file on disk produced or consumed during preparation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub ext: String,
    pub role: ArtifactRole,
}

/// The preparer's decision on how to present audio to the transcriber.
#[derive(Debug, Clone)]
pub enum Plan {
    Single(AudioArtifact),
    Segmented {
        segments: Vec<AudioArtifact>,
        segment_duration_secs: u64,
    },
}

impl Plan {
    pub fn total_segments(&self) -> usize {
        match self {
            Plan::Single(_) => 1,
            Plan::Segmented { segments, .. } => segments.len(),
        }
    }
}

/// A single word with its own timestamp, as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A single timestamped segment of transcript text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub speaker: Option<String>,
}

/// One provider response, before merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    pub duration_sec: f64,
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

/// The result of merging all (possibly partial) per-segment raw transcripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedTranscript {
    pub text: String,
    pub duration_sec: f64,
    pub language: Option<String>,
    pub segments: Vec<Segment>,
    pub total_segments: usize,
}

/// Content type used to pick a transcription prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Podcast,
    Interview,
    Lecture,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Podcast
    }
}

/// Output rendering format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    Srt,
    Vtt,
    Json,
}

/// `sourceLanguage`: either an explicit tag or "auto" (provider detects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    Auto,
    Tag(String),
}

impl Default for SourceLanguage {
    fn default() -> Self {
        SourceLanguage::Auto
    }
}

/// Per-job parameters supplied at submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParams {
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<OutputFormat>,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub source_language: SourceLanguage,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub enable_speaker_diarization: bool,
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Txt]
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            output_formats: default_output_formats(),
            content_type: ContentType::default(),
            source_language: SourceLanguage::default(),
            keywords: String::new(),
            enable_speaker_diarization: false,
        }
    }
}

/// Job lifecycle state. Advances only forward, except `Cancelled`
/// which may be entered from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Preparing,
    Transcribing,
    PostProcessing,
    Rendering,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Done | JobState::Failed | JobState::Cancelled
        )
    }
}

/// Rendered output per requested format.
pub type RenderedFormats = std::collections::HashMap<OutputFormat, String>;

/// Everything `AwaitResult` hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub formats: RenderedFormats,
    pub language: Option<String>,
    pub duration_sec: f64,
    pub segments: Vec<Segment>,
}
