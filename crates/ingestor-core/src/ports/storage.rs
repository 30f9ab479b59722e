//! StorageHandle port - リレーショナル DB へのハンドル
//!
//! 現状の処理パスは DB を読み書きしない。起動時の疎通確認にだけ使い、
//! ワーカーには将来の拡張用に注入しておく。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to build connection pool: {0}")]
    Build(#[from] deadpool_postgres::CreatePoolError),

    #[error("failed to check out a connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("failed to configure TLS: {0}")]
    Tls(#[from] rustls::Error),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

/// Storage collaborator shared by every worker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageHandle: Send + Sync {
    /// Round-trip a trivial query to prove the database is reachable.
    async fn ping(&self) -> Result<(), StorageError>;
}
