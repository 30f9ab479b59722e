//! App - アプリケーション層
//!
//! ports を組み合わせて取り込みループを実装します。
//!
//! # 主要コンポーネント
//! - **MessagePipeline**: body の decode と検証
//! - **BackoffController**: 連続 receive 失敗の線形 backoff
//! - **Worker**: ポーリングループ（receive→process→delete）
//! - **WorkerPool / WorkerPoolBuilder**: N 本のワーカーの起動と停止

pub mod backoff;
pub mod builder;
pub mod pipeline;
pub mod worker_loop;
pub mod worker_pool;

// 主要な型を再エクスポート
pub use self::backoff::{BackoffController, BackoffPolicy, DEFAULT_MAX_RETRIES};
pub use self::builder::{BuildError, WorkerPoolBuilder};
pub use self::pipeline::MessagePipeline;
pub use self::worker_loop::{PollTiming, Worker, WorkerExit};
pub use self::worker_pool::WorkerPool;
