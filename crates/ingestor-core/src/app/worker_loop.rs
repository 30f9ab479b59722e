//! WorkerLoop - fixture イベントの取り込みループ
//!
//! # フロー（1 イテレーション）
//! 1. stop シグナルを non-blocking で確認（唯一のキャンセルポイント）
//! 2. QueueClient::receive（最大 1 件、long-poll 5s、ハードタイムアウト 10s）
//! 3. 失敗 → 線形 backoff で sleep、上限を超えたらこのワーカーだけ終了
//! 4. 0 件 → そのまま次のイテレーションへ（遅延なし）
//! 5. MessagePipeline::process で decode + 検証
//! 6. 成功 → QueueClient::delete。失敗したメッセージは削除せず再配送に任せる
//!
//! receive 中に stop が来ても、receive が返る（またはタイムアウトする）まで待つ。

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::backoff::{BackoffController, BackoffPolicy, DEFAULT_MAX_RETRIES};
use super::builder::BuildError;
use super::pipeline::MessagePipeline;
use crate::domain::QueueMessage;
use crate::observability::WorkerStats;
use crate::ports::{QueueClient, QueueError, ReceiveRequest, StorageHandle};

/// Time constants of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Server-side long-poll wait per receive.
    pub receive_wait: Duration,
    /// Hard upper bound on one receive call, enforced locally.
    pub receive_timeout: Duration,
    /// Linear backoff step after a failed receive.
    pub backoff_unit: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            receive_wait: Duration::from_secs(5),
            receive_timeout: Duration::from_secs(10),
            backoff_unit: Duration::from_secs(2),
        }
    }
}

/// Why `Worker::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stop signal observed (or the loop was already stopped).
    Stopped,
    /// Too many consecutive receive failures. Fatal to this worker only.
    RetriesExhausted { failures: u32 },
}

/// One poll loop over one queue.
///
/// State is private: nothing here is shared with other workers except the
/// `Arc`'d clients and the read side of the stop channel.
pub struct Worker {
    id: usize,
    queue_url: String,
    queue: Arc<dyn QueueClient>,
    storage: Option<Arc<dyn StorageHandle>>,
    stop: watch::Receiver<bool>,
    pipeline: MessagePipeline,
    backoff: BackoffController,
    timing: PollTiming,
    processing: bool,
    stats: WorkerStats,
}

impl Worker {
    /// Create a worker in the `Running` state.
    ///
    /// `max_retries == 0` falls back to the default of 10.
    pub fn new(
        queue_url: impl Into<String>,
        queue: Arc<dyn QueueClient>,
        stop: watch::Receiver<bool>,
        max_retries: u32,
    ) -> Result<Self, BuildError> {
        let queue_url = queue_url.into();
        if queue_url.trim().is_empty() {
            return Err(BuildError::MissingQueueUrl);
        }

        let max_retries = if max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            max_retries
        };
        let timing = PollTiming::default();

        Ok(Self {
            id: 0,
            queue_url,
            queue,
            storage: None,
            stop,
            pipeline: MessagePipeline::new(),
            backoff: BackoffController::new(BackoffPolicy::new(timing.backoff_unit, max_retries)),
            timing,
            processing: true,
            stats: WorkerStats::default(),
        })
    }

    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn with_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        let max_retries = self.max_retries();
        self.backoff = BackoffController::new(BackoffPolicy::new(timing.backoff_unit, max_retries));
        self
    }

    /// Inject the storage handle. The processing path does not use it yet.
    pub fn with_storage(mut self, storage: Arc<dyn StorageHandle>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn max_retries(&self) -> u32 {
        self.backoff.policy().max_retries
    }

    pub fn timing(&self) -> PollTiming {
        self.timing
    }

    pub fn storage(&self) -> Option<&Arc<dyn StorageHandle>> {
        self.storage.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.consecutive_failures()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Poll until stopped or until the retry ceiling is exceeded.
    pub async fn run(&mut self) -> WorkerExit {
        info!(
            worker_id = self.id,
            queue_url = %self.queue_url,
            max_retries = self.max_retries(),
            "fixture ingestor worker started"
        );

        let exit = loop {
            if let ControlFlow::Break(exit) = self.poll_once().await {
                break exit;
            }
        };

        info!(
            worker_id = self.id,
            exit = ?exit,
            stats = ?self.stats,
            "fixture ingestor worker stopped"
        );
        exit
    }

    /// One loop iteration: stop check, receive, process, acknowledge.
    pub async fn poll_once(&mut self) -> ControlFlow<WorkerExit> {
        if self.stop_requested() {
            self.processing = false;
            return ControlFlow::Break(WorkerExit::Stopped);
        }
        if !self.processing {
            warn!(worker_id = self.id, "worker is not processing");
            return ControlFlow::Break(WorkerExit::Stopped);
        }

        let messages = match self.receive().await {
            Ok(messages) => messages,
            Err(err) => return self.on_receive_failure(err).await,
        };
        self.backoff.on_success();

        let mut messages = messages.into_iter();
        let Some(message) = messages.next() else {
            // 空振りは成功扱い。遅延なしで次へ
            return ControlFlow::Continue(());
        };
        if messages.len() > 0 {
            // 1 件ずつ処理する。残りは visibility timeout 後に再配送される
            debug!(
                worker_id = self.id,
                extra = messages.len(),
                "transport returned more than one message, handling the first only"
            );
        }

        self.stats.received += 1;
        self.handle(message).await;
        ControlFlow::Continue(())
    }

    // sender が drop されていても停止扱い
    fn stop_requested(&self) -> bool {
        let signaled = *self.stop.borrow();
        signaled || self.stop.has_changed().is_err()
    }

    async fn receive(&self) -> Result<Vec<QueueMessage>, QueueError> {
        let request = ReceiveRequest::single(self.queue_url.clone(), self.timing.receive_wait);
        match tokio::time::timeout(self.timing.receive_timeout, self.queue.receive(&request)).await {
            Ok(result) => result,
            Err(_) => Err(QueueError::Timeout(self.timing.receive_timeout)),
        }
    }

    async fn on_receive_failure(&mut self, err: QueueError) -> ControlFlow<WorkerExit> {
        self.stats.receive_failures += 1;
        let delay = self.backoff.on_failure();
        let failures = self.backoff.consecutive_failures();

        warn!(
            worker_id = self.id,
            error = %err,
            consecutive_failures = failures,
            backoff_ms = delay.as_millis() as u64,
            "error receiving message, backing off"
        );
        tokio::time::sleep(delay).await;

        if self.backoff.retries_exhausted() {
            error!(
                worker_id = self.id,
                consecutive_failures = failures,
                max_retries = self.max_retries(),
                "too many receive failures, worker exiting"
            );
            self.processing = false;
            return ControlFlow::Break(WorkerExit::RetriesExhausted { failures });
        }
        ControlFlow::Continue(())
    }

    async fn handle(&mut self, message: QueueMessage) {
        let event = match self.pipeline.process(message.body()) {
            Ok(event) => event,
            Err(err) => {
                self.stats.rejected += 1;
                warn!(
                    worker_id = self.id,
                    message_id = %message.id(),
                    error = %err,
                    "error handling message, leaving it for redelivery"
                );
                return;
            }
        };

        if let Err(err) = self
            .queue
            .delete(&self.queue_url, message.receipt_handle())
            .await
        {
            self.stats.ack_failures += 1;
            error!(
                worker_id = self.id,
                message_id = %message.id(),
                receipt_handle = %message.receipt_handle(),
                error = %err,
                "error deleting message"
            );
            return;
        }

        self.stats.processed += 1;
        debug!(
            worker_id = self.id,
            message_id = %message.id(),
            fixture_id = event.id,
            sport_id = event.sport_id,
            "fixture event processed"
        );
    }
}
