//! Concurrency-limited worker pool for per-segment transcription.
//!
//! Follows `tts/queue.rs::TtsQueue`'s shape: a
//! `Semaphore`-backed enqueue that caps in-flight tasks, generalized from a
//! single synthesis job to transcribing N independently-ordered segments
//! and collecting results back into segment order.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

pub struct TranscriptionPool {
    semaphore: Arc<Semaphore>,
}

impl TranscriptionPool {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Enqueue one unit of work. Runs once a permit is free; concurrency is
    /// capped at the pool's `max_concurrent`.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> JoinHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed while the pool is alive");
            task().await
        })
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
