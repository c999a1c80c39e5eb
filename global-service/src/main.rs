//! # Vetchium - Global Service
//!
//! The platform-wide admin process: the only HTTP server behind
//! `/admin/*`, plus (on the leader instance) the admin email queue worker
//! and the global token GC.
//!
//! It owns exactly one connection pool - the global store. It never
//! touches a regional store: admin state has no region, and regional PII
//! is reachable only through the regional fleets.
//!
//! ## Topology
//!
//! 1–2 stateless HTTP instances; exactly one of them is started with
//! `JOBS_ENABLED=true` and runs the background loops.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::email::mailer::SmtpMailer;
use shared::email::queue::EmailQueue;
use shared::email::worker::EmailWorker;
use shared::database::StoreTier;
use shared::{config::AppConfig, database, telemetry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

mod api;
mod domain;
mod jobs;
mod repository;
mod service;

use api::routes;
use repository::AdminRepository;
use service::AdminService;

/// Shared application state injected into all request handlers.
pub struct AppState {
    /// Admin identity flows
    pub admin: AdminService,
    /// Global store pool, for the health probe
    pub pool: sqlx::PgPool,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    telemetry::init_tracing("global-service", config.is_production());

    info!(
        host = %config.server.host,
        port = config.server.port,
        jobs_enabled = config.jobs_enabled,
        "Starting global-service"
    );

    let pool = database::connect(StoreTier::Global, &config.global_db)
        .await
        .expect("Failed to open global pool");

    let emails = EmailQueue::admin(pool.clone());
    let admin = AdminService::new(
        AdminRepository::new(pool.clone()),
        emails.clone(),
        config.tokens.clone(),
    );

    let app_state = web::Data::new(AppState {
        admin,
        pool: pool.clone(),
    });

    // Background loops, only on the leader instance.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut job_handles = Vec::new();
    if config.jobs_enabled {
        let mailer =
            Arc::new(SmtpMailer::new(&config.smtp).expect("Failed to build SMTP mailer"));
        let worker = EmailWorker::new(emails, mailer, config.email_worker.clone());
        job_handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        job_handles.push(tokio::spawn(jobs::run_gc(
            pool.clone(),
            config.cleanup.interval,
            shutdown_rx,
        )));
    }

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                shared::ApiError::BadRequest {
                    message: err.to_string(),
                }
                .into()
            }))
            .configure(routes::configure)
    })
    .bind((server_host, server_port))?
    .run()
    .await;

    // Actix has drained HTTP; stop the job loops the same way.
    let _ = shutdown_tx.send(true);
    for handle in job_handles {
        let _ = handle.await;
    }

    info!("Global service stopped");
    server
}
