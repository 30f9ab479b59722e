//! WorkerPoolBuilder - ワーカープールの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - queue URL / QueueClient / ワーカー数を start() 時に検証
//! - 不足があれば BuildError を返し、プロセスは起動しない

use std::sync::Arc;

use tokio::sync::watch;

use super::backoff::DEFAULT_MAX_RETRIES;
use super::worker_loop::{PollTiming, Worker};
use super::worker_pool::WorkerPool;
use crate::ports::{QueueClient, StorageHandle};

/// Invalid worker configuration detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("queue URL is required")]
    MissingQueueUrl,

    #[error("queue client is required")]
    MissingQueueClient,

    #[error("worker count must be at least 1")]
    NoWorkers,
}

/// Builds and starts a `WorkerPool`.
///
/// # 使用例
/// ```ignore
/// let pool = WorkerPool::builder()
///     .queue_url(&config.queue_url)
///     .queue_client(Arc::new(sqs))
///     .workers(config.worker_count)
///     .max_retries(config.max_retries)
///     .start()?;
/// ```
pub struct WorkerPoolBuilder {
    queue_url: Option<String>,
    queue: Option<Arc<dyn QueueClient>>,
    storage: Option<Arc<dyn StorageHandle>>,
    workers: usize,
    max_retries: u32,
    timing: PollTiming,
}

impl WorkerPoolBuilder {
    pub fn new() -> Self {
        Self {
            queue_url: None,
            queue: None,
            storage: None,
            workers: 1,
            max_retries: DEFAULT_MAX_RETRIES,
            timing: PollTiming::default(),
        }
    }

    pub fn queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = Some(queue_url.into());
        self
    }

    pub fn queue_client(mut self, queue: Arc<dyn QueueClient>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageHandle>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// `0` means "use the default" (10).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Validate, construct every worker, then spawn them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> Result<WorkerPool, BuildError> {
        let queue_url = self.queue_url.ok_or(BuildError::MissingQueueUrl)?;
        let queue = self.queue.ok_or(BuildError::MissingQueueClient)?;
        if self.workers == 0 {
            return Err(BuildError::NoWorkers);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // 全ワーカーを先に組み立ててから spawn する（途中失敗で半端に起動しない）
        let mut workers = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let mut worker = Worker::new(
                queue_url.clone(),
                Arc::clone(&queue),
                shutdown_rx.clone(),
                self.max_retries,
            )?
            .with_id(worker_id)
            .with_timing(self.timing);
            if let Some(storage) = &self.storage {
                worker = worker.with_storage(Arc::clone(storage));
            }
            workers.push(worker);
        }

        Ok(WorkerPool::spawn(workers, shutdown_tx))
    }
}

impl Default for WorkerPoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
