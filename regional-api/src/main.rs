//! # Vetchium - Regional API Node
//!
//! One stateless API node of one region. The fleet of these nodes across
//! all regions behaves as a single logical service:
//!
//! ```text
//!                        ┌──────────────┐
//!          client ──────►│      LB      │  (no region affinity)
//!                        └──────┬───────┘
//!                               ▼
//!                    ┌─────────────────────┐
//!                    │  any regional node  │
//!                    │  ┌───────────────┐  │       ┌─────────────────┐
//!                    │  │ region router │──┼──────►│ owner node in   │
//!                    │  └──────┬────────┘  │ proxy │ peer region     │
//!                    │         │ local     │       └─────────────────┘
//!                    │         ▼           │
//!                    │  handlers/services  │
//!                    │   │           │     │
//!                    └───┼───────────┼─────┘
//!                        ▼           ▼
//!                 regional store   global directory
//!                 (all PII)        (routing only)
//! ```
//!
//! The node owns two connection pools: its own regional store (users,
//! sessions, tokens, email queue) and a read-mostly handle on the global
//! directory (routing entries, signup tokens). PII for a user never leaves
//! the user's home region; requests travel instead.
//!
//! ## Configuration
//!
//! Key settings (see [`shared::config`]):
//!
//! - `REGION` - which region this node serves
//! - `GLOBAL_DB_CONN` / `REGIONAL_DB_CONN` - the two datastores
//! - `INTERNAL_ENDPOINT_{IND1,USA1,DEU1}` - peer endpoints for proxy hops
//! - `PROXY_TIMEOUT` / `PROXY_MAX_BODY_BYTES` - hop tuning
//! - token TTL variables per kind

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use shared::database::StoreTier;
use shared::{
    config::AppConfig, database, email::queue::EmailQueue, telemetry, Region,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

mod api;
mod domain;
mod proxy;
mod repository;
mod service;

use api::routes;
use domain::MemberKind;
use proxy::{RegionRouter, RouterState};
use repository::{DomainRepository, GlobalDirectory, HubRepository, MemberRepository};
use service::dns::HickoryTxtResolver;
use service::{DomainService, HubIdentityService, MemberIdentityService};

/// Shared application state injected into all request handlers.
///
/// Everything inside is cheap to clone (`PgPool`-backed repositories,
/// `Arc`-wrapped resolver); the struct itself is wrapped in
/// [`actix_web::web::Data`] once at startup.
pub struct AppState {
    /// Region this node serves
    pub region: Region,
    /// Global directory reads (catalog, check-domain)
    pub directory: GlobalDirectory,
    /// Hub identity flows
    pub hub: HubIdentityService,
    /// Employer identity flows
    pub employer: MemberIdentityService,
    /// Agency identity flows
    pub agency: MemberIdentityService,
    /// Employer domain verification
    pub employer_domains: DomainService,
    /// Agency domain verification
    pub agency_domains: DomainService,
    /// Global directory pool, for the health probe
    pub global_pool: PgPool,
    /// Own regional pool, for the health probe
    pub regional_pool: PgPool,
}

impl AppState {
    /// The identity service for one member family.
    pub fn members(&self, kind: MemberKind) -> &MemberIdentityService {
        match kind {
            MemberKind::Employer => &self.employer,
            MemberKind::Agency => &self.agency,
        }
    }

    /// The domain service for one member family.
    pub fn domains(&self, kind: MemberKind) -> &DomainService {
        match kind {
            MemberKind::Employer => &self.employer_domains,
            MemberKind::Agency => &self.agency_domains,
        }
    }
}

fn build_member_stack(
    kind: MemberKind,
    region: Region,
    directory: &GlobalDirectory,
    regional_pool: &PgPool,
    emails: &EmailQueue,
    config: &AppConfig,
    resolver: Arc<HickoryTxtResolver>,
) -> (MemberIdentityService, DomainService) {
    let repo = MemberRepository::new(regional_pool.clone(), kind);
    let identity = MemberIdentityService::new(
        region,
        directory.clone(),
        repo.clone(),
        emails.clone(),
        config.tokens.clone(),
        resolver.clone(),
    );
    let domains = DomainService::new(
        region,
        directory.clone(),
        repo,
        DomainRepository::new(regional_pool.clone(), kind),
        resolver,
        config.domains.clone(),
    );
    (identity, domains)
}

/// Application entry point.
///
/// # Initialization Sequence
///
/// 1. Load configuration from environment variables
/// 2. Initialize structured logging
/// 3. Create the two connection pools (global + regional)
/// 4. Instantiate repositories and services
/// 5. Configure and start the HTTP server with the region router in front
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::from_env().expect("Failed to load configuration");

    telemetry::init_tracing("regional-api", config.is_production());

    let region = config.require_region().expect("REGION is required");
    let topology = config.topology().expect("REGION is required");

    info!(
        region = %region,
        host = %config.server.host,
        port = config.server.port,
        "Starting regional-api"
    );

    // Two pools: the global directory and this region's own store.
    let global_pool = database::connect(StoreTier::Global, &config.global_db)
        .await
        .expect("Failed to open global pool");
    let regional_pool = database::connect(
        StoreTier::Regional,
        config
            .require_regional_db()
            .expect("REGIONAL_DB_CONN is required"),
    )
    .await
    .expect("Failed to open regional pool");

    let directory = GlobalDirectory::new(global_pool.clone());
    let emails = EmailQueue::regional(regional_pool.clone());
    let resolver = Arc::new(HickoryTxtResolver::new());

    let hub = HubIdentityService::new(
        region,
        directory.clone(),
        HubRepository::new(regional_pool.clone()),
        emails.clone(),
        config.tokens.clone(),
    );
    let (employer, employer_domains) = build_member_stack(
        MemberKind::Employer,
        region,
        &directory,
        &regional_pool,
        &emails,
        &config,
        resolver.clone(),
    );
    let (agency, agency_domains) = build_member_stack(
        MemberKind::Agency,
        region,
        &directory,
        &regional_pool,
        &emails,
        &config,
        resolver,
    );

    let app_state = web::Data::new(AppState {
        region,
        directory: directory.clone(),
        hub,
        employer,
        agency,
        employer_domains,
        agency_domains,
        global_pool: global_pool.clone(),
        regional_pool: regional_pool.clone(),
    });

    // The router shares the directory handle for its lookups; the reqwest
    // client is the proxy's outbound connection pool.
    let router_state = Arc::new(RouterState {
        topology,
        directory,
    });
    let proxy_client = reqwest::Client::new();
    let proxy_timeout = config.proxy.timeout;
    let proxy_max_body = config.proxy.max_body_bytes;

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    info!("Server listening on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            // Middleware stack (first added = last executed). The region
            // router runs before handlers so a proxied request never
            // touches local extractors.
            .wrap(RegionRouter::new(
                Arc::clone(&router_state),
                proxy_client.clone(),
                proxy_timeout,
                proxy_max_body,
            ))
            .wrap(cors)
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(app_state.clone())
            // Malformed JSON surfaces through the same error shape as
            // everything else.
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
    .await
}
