//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqsQueueClient**: 本番用のキュー（AWS SQS）
//! - **InMemoryQueueClient**: 開発・テスト用のキュー
//! - **PostgresStorage**: StorageHandle の PostgreSQL 実装

pub mod inmem_queue;
pub mod postgres;
pub mod sqs;

pub use self::inmem_queue::InMemoryQueueClient;
pub use self::postgres::{PostgresSettings, PostgresStorage};
pub use self::sqs::{SqsQueueClient, SqsSettings};
