//! QueueClient port - メッセージキュー（SQS または InMemory）
//!
//! コアが必要とする能力は 2 つだけ：
//! - receive（最大 1 件、long-poll 付き）
//! - delete（receipt handle 指定）
//!
//! バッチ削除に対応したトランスポートも、この trait の裏に隠せばループ側は変更不要。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{QueueMessage, ReceiptHandle};

/// Transport-level failure. Every variant is treated as transient by the worker.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("receive failed: {0}")]
    Receive(String),

    #[error("delete failed: {0}")]
    Delete(String),

    /// The receive call did not return within the worker's hard timeout.
    #[error("receive timed out after {0:?}")]
    Timeout(Duration),
}

/// Parameters of one receive call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub queue_url: String,
    pub max_messages: u32,
    /// Server-side long-poll wait.
    pub wait_time: Duration,
}

impl ReceiveRequest {
    /// Single-message request, which is the only shape the worker issues.
    pub fn single(queue_url: impl Into<String>, wait_time: Duration) -> Self {
        Self {
            queue_url: queue_url.into(),
            max_messages: 1,
            wait_time,
        }
    }
}

/// Queue transport capability set.
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーが同じクライアントを `Arc` で共有する）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `request.max_messages` messages, waiting at most
    /// `request.wait_time` server-side. An empty vec means "nothing right now".
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete (acknowledge) one delivery.
    async fn delete(&self, queue_url: &str, receipt_handle: &ReceiptHandle) -> Result<(), QueueError>;
}
