//! Retry/backoff around a single `SttProvider::transcribe` call.
//!
//! Follows `utils/http.rs::request_with_retry`'s shape: an
//! exponential backoff loop around a fallible async call, with
//! eprintln!-style progress logging replaced by `tracing` + the job log.
//! The schedule itself is `delay_i = min(base * 2^(i-1), 30s)`, with
//! `base = 5s` for the connection-reset / quota-suspected / rate-limited
//! classes and `base = 2s` otherwise.

use crate::error::{ProviderErrorClass, SttError};
use crate::job_log::JobLog;
use crate::transcriber::provider::{SttProvider, TranscribeOptions};
use std::path::Path;
use std::time::Duration;

const MAX_DELAY_SEC: u64 = 30;

/// Rate-limit/quota-suspected classes get the longer 5s base, everything
/// else retryable gets 2s.
fn base_delay_secs(class: ProviderErrorClass) -> u64 {
    match class {
        ProviderErrorClass::RateLimit | ProviderErrorClass::PossibleQuotaOrNetwork => 5,
        _ => 2,
    }
}

/// `delay_i = min(base * 2^(i-1), 30s)` for the i-th retry attempt (1-indexed).
fn backoff_delay(class: ProviderErrorClass, attempt: u32) -> Duration {
    let base = base_delay_secs(class);
    let scaled = base.saturating_mul(1u64 << attempt.saturating_sub(1).min(62));
    Duration::from_secs(scaled.min(MAX_DELAY_SEC))
}

/// Run `provider.transcribe` up to `max_attempts` total times on a
/// retryable error, backing off exponentially between attempts. Non-retryable
/// errors (quota, auth, forbidden, fatal) fail fast on the first attempt.
/// Each attempt opens a fresh input stream (the caller re-reads from `path`),
/// so retries never replay a partially-consumed stream.
pub async fn transcribe_with_retry(
    provider: &dyn SttProvider,
    path: &Path,
    options: &TranscribeOptions,
    max_attempts: u32,
    job_id: &str,
    label: &str,
    log: &JobLog,
) -> Result<crate::types::RawTranscript, SttError> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match provider.transcribe(path, options).await {
            Ok(transcript) => return Ok(transcript),
            Err(e) => {
                if !e.class.retryable() || attempt >= max_attempts {
                    log.error(
                        job_id,
                        "transcribe",
                        format!("{} failed permanently after {} attempt(s): {}", label, attempt, e.message),
                    )
                    .await;
                    return Err(e);
                }

                let delay = backoff_delay(e.class, attempt);
                log.warn(
                    job_id,
                    "transcribe",
                    format!(
                        "{} failed ({:?}: {}), retrying in {:?} (attempt {}/{})",
                        label, e.class, e.message, delay, attempt, max_attempts
                    ),
                )
                .await;

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Whether a given class should be surfaced to the caller immediately
/// instead of being retried ("fail fast" classes).
pub fn is_fatal(class: ProviderErrorClass) -> bool {
    !class.retryable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawTranscript;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FlakyProvider {
        fail_times: u32,
        calls: AtomicU32,
        class: ProviderErrorClass,
    }

    #[async_trait]
    impl SttProvider for FlakyProvider {
        async fn transcribe(
            &self,
            _path: &Path,
            _options: &TranscribeOptions,
        ) -> Result<RawTranscript, SttError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(SttError::new(self.class, "transient failure"))
            } else {
                Ok(RawTranscript {
                    text: "ok".to_string(),
                    duration_sec: 1.0,
                    language: Some("en".to_string()),
                    segments: vec![],
                })
            }
        }
    }

    struct AlwaysFailProvider {
        class: ProviderErrorClass,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl SttProvider for AlwaysFailProvider {
        async fn transcribe(
            &self,
            _path: &Path,
            _options: &TranscribeOptions,
        ) -> Result<RawTranscript, SttError> {
            *self.calls.lock().unwrap() += 1;
            Err(SttError::new(self.class, "nope"))
        }
    }

    fn opts() -> TranscribeOptions {
        TranscribeOptions {
            language: None,
            prompt: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let provider = FlakyProvider {
            fail_times: 2,
            calls: AtomicU32::new(0),
            class: ProviderErrorClass::RateLimit,
        };
        let log = JobLog::new();

        let result = transcribe_with_retry(
            &provider,
            Path::new("/tmp/x.mp3"),
            &opts(),
            5,
            "job",
            "segment 0",
            &log,
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn quota_exhausted_fails_on_first_attempt() {
        let provider = AlwaysFailProvider {
            class: ProviderErrorClass::QuotaExhausted,
            calls: Mutex::new(0),
        };
        let log = JobLog::new();

        let result = transcribe_with_retry(
            &provider,
            Path::new("/tmp/x.mp3"),
            &opts(),
            5,
            "job",
            "segment 0",
            &log,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*provider.calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_error_gives_up_after_max_attempts() {
        let provider = AlwaysFailProvider {
            class: ProviderErrorClass::NetworkError,
            calls: Mutex::new(0),
        };
        let log = JobLog::new();

        let result = transcribe_with_retry(
            &provider,
            Path::new("/tmp/x.mp3"),
            &opts(),
            3,
            "job",
            "segment 0",
            &log,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(*provider.calls.lock().unwrap(), 3);
    }

    #[test]
    fn is_fatal_matches_retryable_complement() {
        assert!(is_fatal(ProviderErrorClass::AuthInvalid));
        assert!(!is_fatal(ProviderErrorClass::RateLimit));
    }
}
