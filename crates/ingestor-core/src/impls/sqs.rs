//! SqsQueueClient - 本番用の AWS SQS トランスポート

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_sqs::config::Region;
use aws_sdk_sqs::error::DisplayErrorContext;
use tracing::{debug, warn};

use crate::domain::{MessageId, QueueMessage, ReceiptHandle};
use crate::ports::{QueueClient, QueueError, ReceiveRequest};

/// SQS connection settings.
#[derive(Debug, Clone)]
pub struct SqsSettings {
    pub region: String,
    /// Endpoint override, e.g. a localstack URL.
    pub endpoint: Option<String>,
    /// Per-operation HTTP timeout applied by the SDK.
    pub operation_timeout: Duration,
}

/// `QueueClient` backed by `aws_sdk_sqs::Client`.
///
/// The SDK client is internally reference counted, so one instance is shared
/// by every worker.
#[derive(Clone)]
pub struct SqsQueueClient {
    client: aws_sdk_sqs::Client,
}

impl SqsQueueClient {
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Load the default AWS credential chain and build a client.
    pub async fn connect(settings: &SqsSettings) -> Self {
        let timeouts = TimeoutConfig::builder()
            .operation_timeout(settings.operation_timeout)
            .build();

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .timeout_config(timeouts);

        // localstack などのためにエンドポイントを差し替え
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        Self::new(aws_sdk_sqs::Client::new(&sdk_config))
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&request.queue_url)
            .max_number_of_messages(request.max_messages as i32)
            .wait_time_seconds(request.wait_time.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::Receive(DisplayErrorContext(&e).to_string()))?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                let Some(handle) = message.receipt_handle() else {
                    warn!(
                        message_id = message.message_id().unwrap_or("unknown"),
                        "SQS message without receipt handle, skipping"
                    );
                    return None;
                };
                Some(QueueMessage::new(
                    MessageId::new(message.message_id().unwrap_or_default()),
                    message.body().unwrap_or_default(),
                    ReceiptHandle::new(handle),
                ))
            })
            .collect::<Vec<_>>();

        debug!(count = messages.len(), "received messages from SQS");
        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &ReceiptHandle) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .map_err(|e| QueueError::Delete(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}
