mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use ingestor_core::app::{WorkerExit, WorkerPool};
use ingestor_core::impls::{PostgresStorage, SqsQueueClient};
use ingestor_core::ports::StorageHandle;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::IngestorConfig;

#[tokio::main]
async fn main() {
    let config = match IngestorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    if let Err(e) = run(config).await {
        error!("fixture ingestor failed: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    // RUST_LOG があればそちらを優先
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

async fn run(config: IngestorConfig) -> Result<()> {
    info!(
        queue_url = %config.queue_url,
        workers = config.worker_count,
        max_retries = config.max_retries,
        "starting fixture ingestor"
    );

    let mut builder = WorkerPool::builder()
        .queue_url(config.queue_url.clone())
        .workers(config.worker_count)
        .max_retries(config.max_retries)
        .timing(config.timing());

    if let Some(settings) = config.postgres_settings() {
        let storage =
            PostgresStorage::new(&settings).context("Failed to create PostgreSQL pool")?;
        storage
            .ping()
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!(host = %settings.host, database = %settings.database, "storage connected");
        builder = builder.storage(Arc::new(storage));
    }

    let sqs = SqsQueueClient::connect(&config.sqs_settings()).await;
    let pool = builder
        .queue_client(Arc::new(sqs))
        .start()
        .context("Failed to start worker pool")?;

    let reports = pool.run_until(shutdown_signal()).await;

    for report in &reports {
        info!(
            worker_id = report.worker_id,
            exit = ?report.exit,
            received = report.stats.received,
            processed = report.stats.processed,
            rejected = report.stats.rejected,
            ack_failures = report.stats.ack_failures,
            receive_failures = report.stats.receive_failures,
            "worker report"
        );
    }

    let exhausted = reports
        .iter()
        .filter(|r| matches!(r.exit, WorkerExit::RetriesExhausted { .. }))
        .count();
    if !reports.is_empty() && exhausted == reports.len() {
        bail!("all {exhausted} workers exhausted their receive retries");
    }

    info!("fixture ingestor stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
