//! Per-job ring-buffer log.
//!
//! A mutex-guarded mapping from `job_id` to a fixed-capacity FIFO buffer
//! of structured entries. Every append is mirrored to `tracing` at the
//! matching level so operators get the same events in process logs.
//! Completed jobs are swept 5 minutes after reaching a terminal state.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

pub const MAX_ENTRIES: usize = 500;
pub const TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub stage: String,
    pub memory_snapshot: String,
}

/// A rough process memory snapshot string, in the spirit of a
/// system-status command. Best-effort: platforms without `/proc` just get
/// a placeholder rather than an error.
fn memory_snapshot() -> String {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|l| l.starts_with("VmRSS:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .unwrap_or("0");
            return format!("RSS={}kB", rss_kb);
        }
    }
    "RSS=unknown".to_string()
}

/// Bounded FIFO buffer of log entries for a single job.
#[derive(Debug, Default)]
struct RingBuffer {
    entries: VecDeque<JobLogEntry>,
}

impl RingBuffer {
    fn push(&mut self, entry: JobLogEntry) {
        if self.entries.len() >= MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// Shared, process-wide job log store.
#[derive(Clone, Default)]
pub struct JobLog {
    buffers: Arc<Mutex<HashMap<String, RingBuffer>>>,
}

impl JobLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, job_id: &str, level: LogLevel, stage: &str, message: impl Into<String>) {
        let message = message.into();
        let entry = JobLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            message: message.clone(),
            stage: stage.to_string(),
            memory_snapshot: memory_snapshot(),
        };

        match level {
            LogLevel::Info => tracing::info!(job_id, stage, "{}", message),
            LogLevel::Success => tracing::info!(job_id, stage, success = true, "{}", message),
            LogLevel::Warn => tracing::warn!(job_id, stage, "{}", message),
            LogLevel::Error => tracing::error!(job_id, stage, "{}", message),
        }

        let mut buffers = self.buffers.lock().await;
        buffers.entry(job_id.to_string()).or_default().push(entry);
    }

    pub async fn info(&self, job_id: &str, stage: &str, message: impl Into<String>) {
        self.append(job_id, LogLevel::Info, stage, message).await
    }

    pub async fn success(&self, job_id: &str, stage: &str, message: impl Into<String>) {
        self.append(job_id, LogLevel::Success, stage, message).await
    }

    pub async fn warn(&self, job_id: &str, stage: &str, message: impl Into<String>) {
        self.append(job_id, LogLevel::Warn, stage, message).await
    }

    pub async fn error(&self, job_id: &str, stage: &str, message: impl Into<String>) {
        self.append(job_id, LogLevel::Error, stage, message).await
    }

    /// A non-blocking snapshot of everything logged for a job so far.
    pub async fn poll(&self, job_id: &str) -> Vec<JobLogEntry> {
        let buffers = self.buffers.lock().await;
        buffers
            .get(job_id)
            .map(|b| b.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Schedule deletion of a job's buffer `TTL` after it reaches a terminal
    /// state. Spawns a detached task; the buffer is dropped best-effort if
    /// the process exits before the timer fires.
    pub fn schedule_eviction(&self, job_id: String) {
        let buffers = self.buffers.clone();
        tokio::spawn(async move {
            tokio::time::sleep(TTL).await;
            buffers.lock().await.remove(&job_id);
        });
    }

    #[cfg(test)]
    pub async fn len(&self, job_id: &str) -> usize {
        let buffers = self.buffers.lock().await;
        buffers.get(job_id).map(|b| b.entries.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appended_entries_are_polled_back_in_order() {
        let log = JobLog::new();
        log.info("job-1", "fetch", "starting download").await;
        log.success("job-1", "fetch", "download complete").await;

        let entries = log.poll("job-1").await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "starting download");
        assert_eq!(entries[1].level, LogLevel::Success);
    }

    #[tokio::test]
    async fn buffer_never_exceeds_max_entries() {
        let log = JobLog::new();
        for i in 0..(MAX_ENTRIES + 50) {
            log.info("job-overflow", "transcribe", format!("tick {}", i)).await;
        }
        assert_eq!(log.len("job-overflow").await, MAX_ENTRIES);

        // FIFO: the oldest entries should have been evicted, so the first
        // surviving message should not be "tick 0".
        let entries = log.poll("job-overflow").await;
        assert_ne!(entries[0].message, "tick 0");
    }

    #[tokio::test]
    async fn jobs_are_isolated() {
        let log = JobLog::new();
        log.info("job-a", "fetch", "a-message").await;
        log.info("job-b", "fetch", "b-message").await;

        assert_eq!(log.poll("job-a").await.len(), 1);
        assert_eq!(log.poll("job-b").await.len(), 1);
        assert_eq!(log.poll("job-nonexistent").await.len(), 0);
    }
}
