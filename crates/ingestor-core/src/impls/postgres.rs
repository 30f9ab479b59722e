//! PostgresStorage - StorageHandle の PostgreSQL 実装（コネクションプール付き）
//!
//! `ssl_mode` が有効なら rustls で TLS 接続する（SNI / 証明書検証は host 名で行う）。
//! 無効なら平文。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, SslMode,
};
use rustls::{ClientConfig, RootCertStore};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::debug;

use crate::ports::{StorageError, StorageHandle};

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    /// `None` → 4 × available parallelism.
    pub max_pool_size: Option<usize>,
    pub connect_timeout: Duration,
    /// Require TLS, verified against the webpki root store.
    pub ssl_mode: bool,
}

impl PostgresSettings {
    pub fn pool_size(&self) -> usize {
        self.max_pool_size.unwrap_or_else(|| {
            4 * std::thread::available_parallelism().map_or(1, |n| n.get())
        })
    }
}

/// PostgreSQL handle with connection pooling.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: Pool,
}

impl PostgresStorage {
    /// Build the pool. No connection is opened until the first checkout.
    pub fn new(settings: &PostgresSettings) -> Result<Self, StorageError> {
        let cfg = pool_config(settings);
        let pool = if settings.ssl_mode {
            cfg.create_pool(Some(Runtime::Tokio1), tls_connector()?)?
        } else {
            cfg.create_pool(Some(Runtime::Tokio1), NoTls)?
        };
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

fn pool_config(settings: &PostgresSettings) -> Config {
    let mut cfg = Config::new();
    cfg.host = Some(settings.host.clone());
    cfg.port = Some(settings.port);
    cfg.dbname = Some(settings.database.clone());
    cfg.user = Some(settings.user.clone());
    cfg.password = Some(settings.password.clone());
    cfg.connect_timeout = Some(settings.connect_timeout);
    cfg.ssl_mode = Some(if settings.ssl_mode {
        SslMode::Require
    } else {
        SslMode::Disable
    });
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(settings.pool_size()));
    cfg
}

fn tls_connector() -> Result<MakeRustlsConnect, StorageError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

#[async_trait]
impl StorageHandle for PostgresStorage {
    async fn ping(&self) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("postgres connection successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_pool_size: Option<usize>) -> PostgresSettings {
        settings_with_tls(max_pool_size, false)
    }

    fn settings_with_tls(max_pool_size: Option<usize>, ssl_mode: bool) -> PostgresSettings {
        PostgresSettings {
            host: "localhost".to_string(),
            port: 5432,
            database: "fixtures".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            max_pool_size,
            connect_timeout: Duration::from_secs(15),
            ssl_mode,
        }
    }

    #[test]
    fn explicit_pool_size_wins() {
        assert_eq!(settings(Some(3)).pool_size(), 3);
    }

    #[test]
    fn default_pool_size_scales_with_parallelism() {
        let size = settings(None).pool_size();
        assert!(size >= 4);
        assert_eq!(size % 4, 0);
    }

    #[tokio::test]
    async fn pool_is_built_lazily() {
        let storage = PostgresStorage::new(&settings(Some(2))).unwrap();
        assert_eq!(storage.pool().status().max_size, 2);
    }

    #[tokio::test]
    async fn tls_pool_is_built_lazily() {
        let storage = PostgresStorage::new(&settings_with_tls(Some(2), true)).unwrap();
        assert_eq!(storage.pool().status().max_size, 2);
    }

    #[test]
    fn ssl_mode_selects_require_or_disable() {
        let tls = pool_config(&settings_with_tls(None, true));
        let plain = pool_config(&settings(None));

        assert!(matches!(tls.ssl_mode, Some(SslMode::Require)));
        assert!(matches!(plain.ssl_mode, Some(SslMode::Disable)));
    }
}
