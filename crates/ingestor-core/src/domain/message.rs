//! QueueMessage - トランスポートから受け取った 1 件のメッセージ

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-assigned message identifier. Opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Token issued per delivery; required to delete (acknowledge) that delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One delivery from the queue.
///
/// Consumed exactly once by the pipeline, then either deleted (success) or
/// left alone so the transport redelivers it after the visibility timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    id: MessageId,
    body: String,
    receipt_handle: ReceiptHandle,
}

impl QueueMessage {
    pub fn new(id: MessageId, body: impl Into<String>, receipt_handle: ReceiptHandle) -> Self {
        Self {
            id,
            body: body.into(),
            receipt_handle,
        }
    }

    pub fn id(&self) -> &MessageId {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn receipt_handle(&self) -> &ReceiptHandle {
        &self.receipt_handle
    }
}
