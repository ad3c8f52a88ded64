//! Transcriber — drives the external STT provider over a `Plan`.

pub mod pool;
pub mod provider;
pub mod retry;

use crate::error::SttError;
use crate::job_log::JobLog;
use crate::types::{ContentType, Plan, RawTranscript, SourceLanguage};
use pool::TranscriptionPool;
use provider::{SttProvider, TranscribeOptions};
use std::sync::Arc;

pub const SINGLE_FILE_MAX_ATTEMPTS: u32 = 5;
pub const SEGMENT_MAX_ATTEMPTS: u32 = 3;
const PROMPT_MAX_LEN: usize = 400;

/// A segment's outcome after all retries: either a transcript, or a
/// failure marker that the merger must skip without aborting the job.
pub struct SegmentOutcome {
    pub index: usize,
    pub result: Result<RawTranscript, SttError>,
}

fn content_type_hint(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Podcast => "This is a podcast episode with conversational speech.",
        ContentType::Interview => "This is an interview with two or more speakers.",
        ContentType::Lecture => "This is a lecture or educational talk by a single speaker.",
    }
}

/// Build the provider prompt from content type + optional keywords, capped
/// at `PROMPT_MAX_LEN` characters with keywords given truncation priority
/// over the content-type hint.
pub fn build_prompt(content_type: ContentType, keywords: &str) -> String {
    let keywords = keywords.trim();
    if keywords.is_empty() {
        let base = content_type_hint(content_type);
        return truncate_chars(base, PROMPT_MAX_LEN);
    }

    let keywords_truncated = truncate_chars(keywords, PROMPT_MAX_LEN);
    let remaining = PROMPT_MAX_LEN.saturating_sub(keywords_truncated.chars().count());
    if remaining == 0 {
        return keywords_truncated;
    }

    let base = content_type_hint(content_type);
    let mut combined = keywords_truncated.clone();
    combined.push(' ');
    combined.push_str(base);
    truncate_chars(&combined, PROMPT_MAX_LEN)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn language_param(source_language: &SourceLanguage) -> Option<String> {
    match source_language {
        SourceLanguage::Auto => None,
        SourceLanguage::Tag(tag) => Some(tag.clone()),
    }
}

/// Single-file path: up to `SINGLE_FILE_MAX_ATTEMPTS` total provider calls.
pub async fn transcribe_single(
    provider: &dyn SttProvider,
    path: &std::path::Path,
    content_type: ContentType,
    source_language: &SourceLanguage,
    keywords: &str,
    job_id: &str,
    log: &JobLog,
) -> Result<RawTranscript, SttError> {
    let options = TranscribeOptions {
        language: language_param(source_language),
        prompt: build_prompt(content_type, keywords),
    };

    retry::transcribe_with_retry(
        provider,
        path,
        &options,
        SINGLE_FILE_MAX_ATTEMPTS,
        job_id,
        "single file",
        log,
    )
    .await
}

/// Segmented path: dispatches all segments through a bounded-concurrency
/// pool in index order; completion order is unconstrained, but the
/// returned vector is sorted back into index order for the merger.
pub async fn transcribe_segments(
    provider: Arc<dyn SttProvider>,
    plan: &Plan,
    content_type: ContentType,
    source_language: &SourceLanguage,
    keywords: &str,
    concurrent_limit: usize,
    job_id: &str,
    log: &JobLog,
) -> Vec<SegmentOutcome> {
    let segments = match plan {
        Plan::Segmented { segments, .. } => segments,
        Plan::Single(_) => return Vec::new(),
    };

    let pool = TranscriptionPool::new(concurrent_limit);
    let options = Arc::new(TranscribeOptions {
        language: language_param(source_language),
        prompt: build_prompt(content_type, keywords),
    });

    let mut handles = Vec::with_capacity(segments.len());
    for (index, artifact) in segments.iter().enumerate() {
        let provider = provider.clone();
        let options = options.clone();
        let path = artifact.path.clone();
        let job_id = job_id.to_string();
        let log = log.clone();

        handles.push(pool.enqueue(move || async move {
            let label = format!("segment {}", index);
            let result = retry::transcribe_with_retry(
                provider.as_ref(),
                &path,
                &options,
                SEGMENT_MAX_ATTEMPTS,
                &job_id,
                &label,
                &log,
            )
            .await;
            SegmentOutcome { index, result }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                tracing::error!(job_id, error = %join_err, "segment task panicked");
            }
        }
    }

    outcomes.sort_by_key(|o| o.index);
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_capped_at_400_chars() {
        let keywords = "x".repeat(500);
        let prompt = build_prompt(ContentType::Podcast, &keywords);
        assert_eq!(prompt.chars().count(), PROMPT_MAX_LEN);
    }

    #[test]
    fn prompt_without_keywords_uses_content_type_hint() {
        let prompt = build_prompt(ContentType::Lecture, "");
        assert!(prompt.contains("lecture"));
    }

    #[test]
    fn prompt_with_keywords_prepends_them() {
        let prompt = build_prompt(ContentType::Interview, "quantum computing, NISQ");
        assert!(prompt.starts_with("quantum computing, NISQ"));
    }

    #[test]
    fn auto_language_omits_parameter() {
        assert_eq!(language_param(&SourceLanguage::Auto), None);
    }

    #[test]
    fn explicit_language_is_passed_through() {
        assert_eq!(
            language_param(&SourceLanguage::Tag("zh".to_string())),
            Some("zh".to_string())
        );
    }
}
