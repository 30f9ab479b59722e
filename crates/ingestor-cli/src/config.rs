//! IngestorConfig - 環境変数 (`FIXTURE_*`) からの設定読み込み

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use ingestor_core::app::PollTiming;
use ingestor_core::impls::{PostgresSettings, SqsSettings};
use serde::Deserialize;

const POSTGRES_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// SQS rejects long-poll waits above 20 seconds.
const MAX_RECEIVE_WAIT_SECS: u64 = 20;

#[derive(Debug, Deserialize, Clone)]
pub struct IngestorConfig {
    /// SQS queue URL to poll
    #[serde(default)]
    pub queue_url: String,

    /// Number of concurrent workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Consecutive receive failures tolerated before a worker gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_receive_wait_secs")]
    pub receive_wait_secs: u64,

    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,

    #[serde(default = "default_backoff_unit_secs")]
    pub backoff_unit_secs: u64,

    // AWS configuration
    #[serde(default = "default_aws_region")]
    pub aws_region: String,

    /// Endpoint override (localstack)
    #[serde(default)]
    pub aws_endpoint: Option<String>,

    #[serde(default = "default_aws_http_timeout_secs")]
    pub aws_http_timeout_secs: u64,

    // PostgreSQL configuration
    /// Storage is only wired in when a host is set
    #[serde(default)]
    pub database_host: Option<String>,

    #[serde(default = "default_database_port")]
    pub database_port: u16,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default = "default_database_user")]
    pub database_user: String,

    #[serde(default)]
    pub database_password: String,

    #[serde(default)]
    pub database_pool_size: Option<usize>,

    /// Connect to PostgreSQL over TLS
    #[serde(default)]
    pub database_ssl_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_count() -> usize {
    1
}

fn default_max_retries() -> u32 {
    ingestor_core::app::DEFAULT_MAX_RETRIES
}

fn default_receive_wait_secs() -> u64 {
    5
}

fn default_receive_timeout_secs() -> u64 {
    10
}

fn default_backoff_unit_secs() -> u64 {
    2
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_aws_http_timeout_secs() -> u64 {
    10
}

fn default_database_port() -> u16 {
    5432
}

fn default_database_name() -> String {
    "postgres".to_string()
}

fn default_database_user() -> String {
    "postgres".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl IngestorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config: Self = Config::builder()
            .add_source(Environment::with_prefix("FIXTURE"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject timing values that would make every receive fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receive_wait_secs > MAX_RECEIVE_WAIT_SECS {
            return Err(ConfigError::Message(format!(
                "receive_wait_secs must be at most {MAX_RECEIVE_WAIT_SECS}, got {}",
                self.receive_wait_secs
            )));
        }
        if self.receive_timeout_secs <= self.receive_wait_secs {
            return Err(ConfigError::Message(format!(
                "receive_timeout_secs ({}) must be greater than receive_wait_secs ({})",
                self.receive_timeout_secs, self.receive_wait_secs
            )));
        }
        Ok(())
    }

    pub fn timing(&self) -> PollTiming {
        PollTiming {
            receive_wait: Duration::from_secs(self.receive_wait_secs),
            receive_timeout: Duration::from_secs(self.receive_timeout_secs),
            backoff_unit: Duration::from_secs(self.backoff_unit_secs),
        }
    }

    pub fn sqs_settings(&self) -> SqsSettings {
        SqsSettings {
            region: self.aws_region.clone(),
            endpoint: self.aws_endpoint.clone().filter(|e| !e.is_empty()),
            operation_timeout: Duration::from_secs(self.aws_http_timeout_secs),
        }
    }

    /// `None` when no database host is configured.
    pub fn postgres_settings(&self) -> Option<PostgresSettings> {
        let host = self.database_host.as_ref().filter(|h| !h.is_empty())?;
        Some(PostgresSettings {
            host: host.clone(),
            port: self.database_port,
            database: self.database_name.clone(),
            user: self.database_user.clone(),
            password: self.database_password.clone(),
            max_pool_size: self.database_pool_size,
            connect_timeout: POSTGRES_CONNECT_TIMEOUT,
            ssl_mode: self.database_ssl_mode,
        })
    }
}
