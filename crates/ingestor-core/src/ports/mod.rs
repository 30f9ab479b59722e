//! Ports - 抽象化レイヤー
//!
//! 外部システム（キュー、DB）へのインターフェース。
//! 実装は `impls` に置き、ワーカーは trait object 越しにだけ触る。

pub mod queue_client;
pub mod storage;

pub use self::queue_client::{QueueClient, QueueError, ReceiveRequest};
pub use self::storage::{StorageError, StorageHandle};

#[cfg(test)]
pub use self::queue_client::MockQueueClient;
#[cfg(test)]
pub use self::storage::MockStorageHandle;
