//! Payment worker entry point.
//!
//! Wires the Postgres ledger and the broker into a payment participant
//! and drains the payment queue with a pool of workers.

mod config;

use std::sync::Arc;

use dispatch::{InMemoryBroker, WorkerPool};
use ledger::PostgresLedger;
use participant::{PaymentParticipant, routes};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder and exporter
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .expect("failed to install Prometheus recorder");

    // 3. Connect the ledger and run migrations
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.worker_count as u32 + 1)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to ledger database");
    let ledger = PostgresLedger::new(pool);
    ledger
        .run_migrations()
        .await
        .expect("ledger migrations failed");

    // 4. Wire the participant to the broker
    let broker = InMemoryBroker::new();
    let receiver = broker
        .subscribe(routes::PAYMENT_QUEUE)
        .expect("payment queue already consumed");
    let participant = Arc::new(
        PaymentParticipant::new(ledger, broker.clone()).with_result_wait(config.result_wait),
    );

    // 5. Start the worker pool
    tracing::info!(
        queue = routes::PAYMENT_QUEUE,
        workers = config.worker_count,
        "payment worker started"
    );
    let pool = WorkerPool::spawn(receiver, participant, config.worker_count);

    shutdown_signal().await;

    // Stop accepting commands, then let the pool finish in-flight
    // work; aborting here could cancel a saga step mid-command.
    broker.close(routes::PAYMENT_QUEUE);
    pool.join().await;
    tracing::info!("worker shut down gracefully");
}
