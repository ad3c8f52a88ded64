//! Job bookkeeping: lifecycle state, cancellation, and the in-memory
//! registry the `PipelineCore` hands `JobHandle`s into.

use crate::error::UserError;
use crate::types::{JobParams, JobResult, JobState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

/// Cooperative cancellation signal threaded through every long-running
/// operation a job starts (fetch, transcode/slice subprocess, provider
/// calls, retry sleeps). Modeled on `tokio::sync::Notify`, in keeping with
/// this crate's habit of reaching for a plain shared `tokio::sync`
/// primitive (`Semaphore`, `Mutex`) rather than a bespoke channel protocol.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel()` has been called. Intended for use in a
    /// `tokio::select!` alongside the work being cancelled.
    pub async fn cancelled(&self) {
        // Register interest before checking the flag: `Notified` captures
        // the notification counter at construction time, so this ordering
        // is immune to a `cancel()` landing between the check and the
        // await (the usual lost-wakeup race with condvar-style signaling).
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// What the caller gets back from `SubmitFromBytes`/`SubmitFromUrl`: enough
/// to poll logs, await the result, or cancel — without exposing the job's
/// internal state.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: String,
}

/// Internal per-job record. `state` and `outcome` are behind their own
/// locks so a reader polling state doesn't block a writer advancing it.
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
    pub params: JobParams,
    pub state: RwLock<JobState>,
    pub outcome: RwLock<Option<Result<JobResult, UserError>>>,
    pub cancellation: CancellationToken,
    pub done: Arc<Notify>,
}

impl JobRecord {
    pub fn new(job_id: String, title: String, params: JobParams) -> Arc<Self> {
        Arc::new(Self {
            job_id,
            title,
            params,
            state: RwLock::new(JobState::Queued),
            outcome: RwLock::new(None),
            cancellation: CancellationToken::new(),
            done: Arc::new(Notify::new()),
        })
    }

    pub async fn set_state(&self, state: JobState) {
        *self.state.write().await = state;
    }

    pub async fn state(&self) -> JobState {
        *self.state.read().await
    }

    /// Record the terminal outcome and wake every `await_result` waiter.
    pub async fn finish(&self, outcome: Result<JobResult, UserError>, final_state: JobState) {
        *self.outcome.write().await = Some(outcome);
        self.set_state(final_state).await;
        self.done.notify_waiters();
    }
}

/// Process-wide map of live jobs. Jobs are removed once their log TTL
/// elapses; the registry itself holds no job-log data, only state/outcome.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Arc<JobRecord>>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: Arc<JobRecord>) {
        self.jobs.write().await.insert(record.job_id.clone(), record);
    }

    pub async fn get(&self, job_id: &str) -> Option<Arc<JobRecord>> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn remove(&self, job_id: &str) {
        self.jobs.write().await.remove(job_id);
    }

    /// Tear down a job's record `crate::job_log::TTL` after it reaches a
    /// terminal state, mirroring the job log's own eviction window. Spawns a
    /// detached task; a caller still holding a cloned `Arc<JobRecord>` (e.g.
    /// a concurrent `await_result`) is unaffected, since removal only drops
    /// the registry's reference.
    pub fn schedule_eviction(&self, job_id: String) {
        let jobs = self.jobs.clone();
        tokio::spawn(async move {
            tokio::time::sleep(crate::job_log::TTL).await;
            jobs.write().await.remove(&job_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellation_token_wakes_waiters() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());

        let waiter = token.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake promptly")
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_token_does_not_block() {
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(50), token.cancelled())
            .await
            .expect("already-cancelled token must resolve immediately");
    }

    #[tokio::test]
    async fn job_store_round_trips_records() {
        let store = JobStore::new();
        let record = JobRecord::new("job-1".to_string(), "t".to_string(), JobParams::default());
        store.insert(record.clone()).await;

        let fetched = store.get("job-1").await.unwrap();
        assert_eq!(fetched.job_id, "job-1");

        store.remove("job-1").await;
        assert!(store.get("job-1").await.is_none());
    }

    #[tokio::test]
    async fn finish_wakes_await_result_style_waiters() {
        let record = JobRecord::new("job-2".to_string(), "t".to_string(), JobParams::default());
        let waiter_record = record.clone();
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            // Registering interest (constructing `notified`) and signalling
            // readiness happen inside this task, before the driving task
            // below is allowed to call `finish()` — so there's no window
            // in which the notification could fire unobserved.
            let notified = waiter_record.done.notified();
            let _ = ready_tx.send(());
            notified.await;
            waiter_record.state().await
        });

        ready_rx.await.expect("waiter task dropped its readiness signal");

        record
            .finish(
                Err(UserError::new(crate::error::ErrorClass::Internal, "x")),
                JobState::Failed,
            )
            .await;

        let state = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state, JobState::Failed);
    }
}
