//! # Tenure Worker
//!
//! Background process for the Tenure platform. It re-ranks the payout queue
//! on a fixed interval, notifying members whose position moved, and checks
//! payout readiness, scheduling payouts when `WORKER_AUTO_PAYOUTS` is set.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p tenure-worker
//! ```

use anyhow::Context;
use tenure_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use tenure_worker::{
    config::WorkerConfig,
    jobs::{JobContext, PayoutJob, QueueRefreshJob},
    scheduler::Scheduler,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Tenure worker starting");

    let config = WorkerConfig::from_env().context("failed to load configuration")?;

    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.max_connections,
        ..DatabaseConfig::default()
    })
    .await
    .context("failed to connect to database")?;

    run_migrations(&pool).await.context("failed to run migrations")?;

    if config.auto_payouts {
        tracing::warn!("Automatic payouts enabled");
    }

    let scheduler = Scheduler::new(JobContext::new(pool.clone(), config.rules.clone()))
        .with_job(QueueRefreshJob::new(config.queue_refresh_interval))
        .with_job(PayoutJob::new(config.payout_check_interval, config.auto_payouts));

    let token = scheduler.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    });

    scheduler.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenure_worker=debug,tenure_shared=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, finishing in-flight jobs");
}
