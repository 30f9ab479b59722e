//! InMemoryQueueClient - 開発・テスト用のキュー
//!
//! # 学習ポイント
//! - tokio::sync::Mutex + Notify による long-poll receive
//! - visibility timeout: receive 済みで delete されないメッセージは期限後に再配送
//! - queue_url ごとに独立したキューを管理
//!
//! 時刻は `tokio::time::Instant` を使うので、`start_paused` のテストでも決定的に動く。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use ulid::Ulid;

use crate::domain::{MessageId, QueueMessage, ReceiptHandle};
use crate::ports::{QueueClient, QueueError, ReceiveRequest};

/// Visibility timeout applied when none is configured.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct StoredMessage {
    id: MessageId,
    body: String,
}

#[derive(Debug)]
struct InFlight {
    message: StoredMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<ReceiptHandle, InFlight>,
    deleted: Vec<ReceiptHandle>,
    receive_calls: usize,
    failing_receives: u32,
    failing_deletes: u32,
}

impl QueueState {
    /// Move every expired in-flight delivery back to the ready queue.
    /// The old receipt handle stops being valid.
    fn release_expired(&mut self, now: Instant) {
        let expired: Vec<ReceiptHandle> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in expired {
            if let Some(entry) = self.in_flight.remove(&handle) {
                self.ready.push_back(entry.message);
            }
        }
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.visible_at).min()
    }
}

/// In-process queue transport.
///
/// # 使用例
/// ```ignore
/// let queue = InMemoryQueueClient::new();
/// queue.send("local://fixtures", r#"{"Id":1,"Details":{}}"#).await;
/// let messages = queue.receive(&ReceiveRequest::single("local://fixtures", wait)).await?;
/// ```
pub struct InMemoryQueueClient {
    /// queue_url ごとのキュー
    queues: Arc<Mutex<HashMap<String, QueueState>>>,
    /// send / 再配送の通知用
    notify: Arc<Notify>,
    visibility_timeout: Duration,
}

impl InMemoryQueueClient {
    pub fn new() -> Self {
        Self::with_visibility_timeout(DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            notify: Arc::new(Notify::new()),
            visibility_timeout,
        }
    }

    /// Enqueue a message body and return its id.
    pub async fn send(&self, queue_url: &str, body: impl Into<String>) -> MessageId {
        let id = MessageId::new(Ulid::new().to_string());
        {
            let mut queues = self.queues.lock().await;
            queues
                .entry(queue_url.to_string())
                .or_default()
                .ready
                .push_back(StoredMessage {
                    id: id.clone(),
                    body: body.into(),
                });
        }
        // 別 URL の waiter に通知を取られないよう、待機中の全員を起こす
        self.notify.notify_waiters();
        id
    }

    /// Make the next `n` receive calls fail.
    pub async fn fail_next_receives(&self, queue_url: &str, n: u32) {
        let mut queues = self.queues.lock().await;
        queues.entry(queue_url.to_string()).or_default().failing_receives = n;
    }

    /// Make the next `n` delete calls fail.
    pub async fn fail_next_deletes(&self, queue_url: &str, n: u32) {
        let mut queues = self.queues.lock().await;
        queues.entry(queue_url.to_string()).or_default().failing_deletes = n;
    }

    /// Receipt handles that were successfully deleted, in order.
    pub async fn deleted_handles(&self, queue_url: &str) -> Vec<ReceiptHandle> {
        let queues = self.queues.lock().await;
        queues
            .get(queue_url)
            .map(|q| q.deleted.clone())
            .unwrap_or_default()
    }

    /// Messages waiting to be received (excluding in-flight ones).
    pub async fn pending_len(&self, queue_url: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue_url).map_or(0, |q| q.ready.len())
    }

    /// Messages received but neither deleted nor expired yet.
    pub async fn in_flight_len(&self, queue_url: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue_url).map_or(0, |q| q.in_flight.len())
    }

    pub async fn receive_calls(&self, queue_url: &str) -> usize {
        let queues = self.queues.lock().await;
        queues.get(queue_url).map_or(0, |q| q.receive_calls)
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + request.wait_time;
        let max = request.max_messages.max(1) as usize;
        let mut first_attempt = true;

        loop {
            // 状態を見る前に登録しておき、その後の send を取りこぼさない
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = {
                let mut queues = self.queues.lock().await;
                let queue = queues.entry(request.queue_url.clone()).or_default();

                if first_attempt {
                    first_attempt = false;
                    queue.receive_calls += 1;
                    if queue.failing_receives > 0 {
                        queue.failing_receives -= 1;
                        return Err(QueueError::Receive("injected receive failure".to_string()));
                    }
                }

                let now = Instant::now();
                queue.release_expired(now);

                if !queue.ready.is_empty() {
                    let mut messages = Vec::with_capacity(max);
                    while messages.len() < max {
                        let Some(stored) = queue.ready.pop_front() else {
                            break;
                        };
                        let handle = ReceiptHandle::new(Ulid::new().to_string());
                        messages.push(QueueMessage::new(
                            stored.id.clone(),
                            stored.body.clone(),
                            handle.clone(),
                        ));
                        queue.in_flight.insert(
                            handle,
                            InFlight {
                                message: stored,
                                visible_at: now + self.visibility_timeout,
                            },
                        );
                    }
                    return Ok(messages);
                }

                if now >= deadline {
                    return Ok(Vec::new());
                }

                // 次に見えるようになるメッセージか deadline の早い方まで待つ
                queue
                    .next_visible_at()
                    .map_or(deadline, |visible_at| visible_at.min(deadline))
            };

            tokio::select! {
                _ = &mut notified => {},
                _ = tokio::time::sleep_until(wake_at) => {},
            }
        }
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &ReceiptHandle) -> Result<(), QueueError> {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(queue_url.to_string()).or_default();

        if queue.failing_deletes > 0 {
            queue.failing_deletes -= 1;
            return Err(QueueError::Delete("injected delete failure".to_string()));
        }

        match queue.in_flight.remove(receipt_handle) {
            Some(_) => {
                queue.deleted.push(receipt_handle.clone());
                Ok(())
            }
            None => Err(QueueError::Delete(format!(
                "unknown receipt handle: {receipt_handle}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "local://fixtures";

    fn request(wait: Duration) -> ReceiveRequest {
        ReceiveRequest::single(URL, wait)
    }

    #[tokio::test(start_paused = true)]
    async fn send_receive_delete_roundtrip() {
        let queue = InMemoryQueueClient::new();
        let id = queue.send(URL, "hello").await;

        let messages = queue.receive(&request(Duration::from_secs(1))).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id(), &id);
        assert_eq!(messages[0].body(), "hello");
        assert_eq!(queue.in_flight_len(URL).await, 1);

        queue.delete(URL, messages[0].receipt_handle()).await.unwrap();

        assert_eq!(queue.in_flight_len(URL).await, 0);
        assert_eq!(
            queue.deleted_handles(URL).await,
            vec![messages[0].receipt_handle().clone()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_receive_waits_for_the_long_poll() {
        let queue = InMemoryQueueClient::new();
        let start = Instant::now();

        let messages = queue.receive(&request(Duration::from_secs(5))).await.unwrap();

        assert!(messages.is_empty());
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn send_wakes_waiting_receive() {
        let queue = Arc::new(InMemoryQueueClient::new());

        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.receive(&request(Duration::from_secs(5))).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        queue.send(URL, "late").await;

        let messages = waiter.await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body(), "late");
    }

    #[tokio::test(start_paused = true)]
    async fn send_wakes_the_receiver_of_its_own_url() {
        let queue = Arc::new(InMemoryQueueClient::new());

        let other = tokio::spawn({
            let queue = queue.clone();
            async move {
                queue
                    .receive(&ReceiveRequest::single("local://other", Duration::from_secs(5)))
                    .await
                    .unwrap()
            }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let waiter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.receive(&request(Duration::from_secs(5))).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        let sent_at = Instant::now();
        queue.send(URL, "mine").await;

        let messages = waiter.await.unwrap();
        assert_eq!(messages[0].body(), "mine");
        assert!(sent_at.elapsed() < Duration::from_secs(1));

        assert!(other.await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn undeleted_message_is_redelivered_after_visibility_timeout() {
        let queue = InMemoryQueueClient::with_visibility_timeout(Duration::from_secs(3));
        queue.send(URL, "retry-me").await;

        let first = queue.receive(&request(Duration::from_secs(1))).await.unwrap();
        assert_eq!(first.len(), 1);

        // 可視化前は何も返らない
        let hidden = queue.receive(&request(Duration::from_secs(1))).await.unwrap();
        assert!(hidden.is_empty());

        let second = queue.receive(&request(Duration::from_secs(5))).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id(), first[0].id());
        assert_ne!(second[0].receipt_handle(), first[0].receipt_handle());

        // 古い handle はもう使えない
        assert!(queue.delete(URL, first[0].receipt_handle()).await.is_err());
        queue.delete(URL, second[0].receipt_handle()).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn injected_failures_are_consumed_in_order() {
        let queue = InMemoryQueueClient::new();
        queue.send(URL, "body").await;
        queue.fail_next_receives(URL, 1).await;
        queue.fail_next_deletes(URL, 1).await;

        assert!(queue.receive(&request(Duration::from_secs(1))).await.is_err());
        let messages = queue.receive(&request(Duration::from_secs(1))).await.unwrap();
        let handle = messages[0].receipt_handle();

        assert!(queue.delete(URL, handle).await.is_err());
        queue.delete(URL, handle).await.unwrap();
        assert_eq!(queue.receive_calls(URL).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queues_are_isolated_by_url() {
        let queue = InMemoryQueueClient::new();
        queue.send("local://a", "a").await;
        queue.send("local://b", "b").await;

        let b = queue
            .receive(&ReceiveRequest::single("local://b", Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(b[0].body(), "b");
        assert_eq!(queue.pending_len("local://a").await, 1);
    }
}
