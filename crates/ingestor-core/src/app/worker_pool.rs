use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::builder::WorkerPoolBuilder;
use super::worker_loop::Worker;
use crate::observability::WorkerReport;

/// Worker pool handle.
/// - 全ワーカーは 1 本の watch チャネルで stop を受け取る
/// - `shutdown_and_join()` / `run_until()` で全ワーカーの終了を待てる
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    joins: JoinSet<WorkerReport>,
    size: usize,
}

impl WorkerPool {
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder::new()
    }

    /// Spawn each worker as its own task. Every worker must have been created
    /// with a receiver of `shutdown_tx`.
    pub(crate) fn spawn(workers: Vec<Worker>, shutdown_tx: watch::Sender<bool>) -> Self {
        let size = workers.len();
        let mut joins = JoinSet::new();

        for mut worker in workers {
            joins.spawn(async move {
                let exit = worker.run().await;
                WorkerReport {
                    worker_id: worker.id(),
                    exit,
                    stats: worker.stats(),
                }
            });
        }

        info!(workers = size, "worker pool started");
        Self {
            shutdown_tx,
            joins,
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Request shutdown for all workers.
    /// In-flight receive/process/delete is not cancelled; each worker notices
    /// the request at the top of its next iteration.
    pub fn request_shutdown(&self) {
        // ignore send error: every worker may already have returned
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(mut self) -> Vec<WorkerReport> {
        self.request_shutdown();
        let mut reports = Vec::with_capacity(self.size);
        while let Some(joined) = self.joins.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(err) => error!(error = %err, "worker task failed"),
            }
        }
        reports
    }

    /// Run until `shutdown` resolves (then stop and drain every worker) or
    /// until every worker has returned on its own.
    pub async fn run_until<F>(mut self, shutdown: F) -> Vec<WorkerReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut reports = Vec::with_capacity(self.size);
        let mut stopping = false;

        loop {
            tokio::select! {
                _ = &mut shutdown, if !stopping => {
                    info!("shutting down fixture ingestor workers");
                    stopping = true;
                    let _ = self.shutdown_tx.send(true);
                }
                joined = self.joins.join_next() => match joined {
                    Some(Ok(report)) => reports.push(report),
                    Some(Err(err)) => error!(error = %err, "worker task failed"),
                    None => break,
                },
            }
        }

        info!(workers = reports.len(), "fixture ingestor workers stopped");
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::worker_loop::{Worker, WorkerExit};
    use crate::impls::InMemoryQueueClient;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    const URL: &str = "local://fixtures";
    const VALID_BODY: &str = r#"{"Id":1,"SportId":2,"TeamId1":3,"TeamId2":4,"DateTime":"2025-01-01T00:00:00Z","Details":{}}"#;

    fn pool(queue: Arc<InMemoryQueueClient>, workers: usize, max_retries: u32) -> WorkerPool {
        WorkerPool::builder()
            .queue_url(URL)
            .queue_client(queue)
            .workers(workers)
            .max_retries(max_retries)
            .start()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reaches_every_worker() {
        let queue = Arc::new(InMemoryQueueClient::new());
        let pool = pool(queue, 3, 5);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let reports = pool.shutdown_and_join().await;

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.exit == WorkerExit::Stopped));
        let ids: HashSet<usize> = reports.iter().map(|r| r.worker_id).collect();
        assert_eq!(ids, HashSet::from([0, 1, 2]));
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_shared_between_workers_and_deleted_once() {
        let queue = Arc::new(InMemoryQueueClient::new());
        for _ in 0..6 {
            queue.send(URL, VALID_BODY).await;
        }
        let pool = pool(queue.clone(), 3, 5);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let reports = pool.shutdown_and_join().await;

        let deleted = queue.deleted_handles(URL).await;
        let unique: HashSet<_> = deleted.iter().collect();
        assert_eq!(deleted.len(), 6);
        assert_eq!(unique.len(), 6);
        assert_eq!(reports.iter().map(|r| r.stats.processed).sum::<u64>(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_stops_workers_when_shutdown_resolves() {
        let queue = Arc::new(InMemoryQueueClient::new());
        let pool = pool(queue, 2, 5);

        let reports = pool
            .run_until(tokio::time::sleep(Duration::from_secs(3)))
            .await;

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.exit == WorkerExit::Stopped));
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_returns_when_every_worker_gives_up() {
        let queue = Arc::new(InMemoryQueueClient::new());
        queue.fail_next_receives(URL, 100).await;
        let pool = pool(queue, 2, 1);

        let reports = pool.run_until(std::future::pending()).await;

        assert_eq!(reports.len(), 2);
        assert!(
            reports
                .iter()
                .all(|r| r.exit == WorkerExit::RetriesExhausted { failures: 2 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_worker_does_not_stop_the_others() {
        let broken = Arc::new(InMemoryQueueClient::new());
        broken.fail_next_receives(URL, u32::MAX).await;
        let healthy = Arc::new(InMemoryQueueClient::new());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = vec![
            Worker::new(URL, broken, shutdown_rx.clone(), 1).unwrap().with_id(0),
            Worker::new(URL, healthy.clone(), shutdown_rx, 1).unwrap().with_id(1),
        ];
        let pool = WorkerPool::spawn(workers, shutdown_tx);

        // worker 0: 2s + 4s の backoff の後で終了する
        tokio::time::sleep(Duration::from_secs(10)).await;
        healthy.send(URL, VALID_BODY).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(healthy.deleted_handles(URL).await.len(), 1);

        let mut reports = pool.shutdown_and_join().await;
        reports.sort_by_key(|r| r.worker_id);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].exit, WorkerExit::RetriesExhausted { failures: 2 });
        assert_eq!(reports[1].exit, WorkerExit::Stopped);
        assert_eq!(reports[1].stats.processed, 1);
        assert_eq!(reports[1].stats.receive_failures, 0);
    }
}
