//! ingestor-core
//!
//! Core building blocks for the fixture ingestor.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（FixtureEvent, QueueMessage, PipelineError）
//! - **ports**: 抽象化レイヤー（QueueClient, StorageHandle）
//! - **app**: アプリケーションロジック（pipeline, backoff, worker_loop, worker_pool, builder）
//! - **impls**: 実装（SQS, Postgres, 開発用の InMemoryQueueClient）
//! - **observability**: ワーカーの終了レポートと集計

pub mod domain;
pub mod ports;
pub mod app;
pub mod impls;
pub mod observability;
