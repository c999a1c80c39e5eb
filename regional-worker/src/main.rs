//! # Vetchium - Regional Worker
//!
//! The one background process of a region. No HTTP surface; two loops:
//!
//! | Loop | Job | Interval |
//! |---|---|---|
//! | [`shared::email::worker`] | Drain the region's outbound email queue | `EMAIL_POLL_INTERVAL` |
//! | [`gc`] | Delete expired sessions/tokens | `CLEANUP_INTERVAL` |
//!
//! Exactly **one** instance runs per region; the queue's claim/send split
//! makes a second instance a correctness hazard, and singleton-ness is the
//! deployment's job (`replicas: 1`, `strategy: Recreate`).
//!
//! The worker owns a single connection pool (its own regional store) and
//! never touches the global directory.

use shared::config::AppConfig;
use shared::email::mailer::SmtpMailer;
use shared::email::queue::EmailQueue;
use shared::email::worker::EmailWorker;
use shared::database::StoreTier;
use shared::{database, telemetry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

mod gc;

/// Resolves when the process should stop (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    telemetry::init_tracing("regional-worker", config.is_production());

    let region = config.require_region().expect("REGION is required");
    info!(region = %region, "Starting regional-worker");

    let pool = database::connect(
        StoreTier::Regional,
        config
            .require_regional_db()
            .expect("REGIONAL_DB_CONN is required"),
    )
    .await
    .expect("Failed to open regional pool");

    let mailer = Arc::new(SmtpMailer::new(&config.smtp).expect("Failed to build SMTP mailer"));
    let worker = EmailWorker::new(
        EmailQueue::regional(pool.clone()),
        mailer,
        config.email_worker.clone(),
    );

    // Both loops watch one flag; flipping it lets in-flight work finish.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let email_task = tokio::spawn(worker.run(shutdown_rx.clone()));
    let gc_task = tokio::spawn(gc::run(pool, config.cleanup.interval, shutdown_rx));

    shutdown_signal().await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = email_task.await;
    let _ = gc_task.await;

    info!("Regional worker stopped");
    Ok(())
}
