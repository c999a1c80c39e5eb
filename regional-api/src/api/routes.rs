//! # Route Configuration
//!
//! Maps the public surface onto handlers. Everything is `POST` with a
//! JSON body except the health probe.
//!
//! ## Route Structure
//!
//! ```text
//! /
//! ├── health                           GET  → health_check
//! │
//! ├── global/
//! │   ├── regions                      POST → regions
//! │   ├── supported-languages          POST → supported_languages
//! │   └── check-domain                 POST → check_domain
//! │
//! ├── hub/
//! │   ├── request-signup               POST   complete-signup
//! │   ├── login   tfa   logout         POST
//! │   ├── request-password-reset       POST   complete-password-reset
//! │   ├── change-password              POST
//! │   ├── request-email-change         POST   complete-email-change
//! │   └── set-language   myinfo        POST
//! │
//! ├── employer/ …                      (member surface)
//! └── agency/ …                        (identical member surface)
//! ```
//!
//! The employer and agency scopes register the **same** handler set; a
//! scope-level `web::Data<MemberKind>` tells the shared handlers which
//! family's tables and directory entries to use.

use actix_web::web;

use crate::domain::MemberKind;

use super::{global_handlers, hub_handlers, member_handlers};

/// Configures all routes for the regional API node.
///
/// Called from `main.rs` during app initialization:
///
/// ```rust,ignore
/// App::new().configure(routes::configure)
/// ```
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        // ─────────────────────────────────────────────────────────────────
        // Health Check
        // ─────────────────────────────────────────────────────────────────
        .route("/health", web::get().to(global_handlers::health_check))
        // ─────────────────────────────────────────────────────────────────
        // Global Catalog (unauthenticated, any region)
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/global")
                .route("/regions", web::post().to(global_handlers::regions))
                .route(
                    "/supported-languages",
                    web::post().to(global_handlers::supported_languages),
                )
                .route("/check-domain", web::post().to(global_handlers::check_domain)),
        )
        // ─────────────────────────────────────────────────────────────────
        // Hub (job-seeker) surface
        // ─────────────────────────────────────────────────────────────────
        .service(
            web::scope("/hub")
                .route("/request-signup", web::post().to(hub_handlers::request_signup))
                .route("/complete-signup", web::post().to(hub_handlers::complete_signup))
                .route("/login", web::post().to(hub_handlers::login))
                .route("/tfa", web::post().to(hub_handlers::tfa))
                .route("/logout", web::post().to(hub_handlers::logout))
                .route(
                    "/request-password-reset",
                    web::post().to(hub_handlers::request_password_reset),
                )
                .route(
                    "/complete-password-reset",
                    web::post().to(hub_handlers::complete_password_reset),
                )
                .route("/change-password", web::post().to(hub_handlers::change_password))
                .route(
                    "/request-email-change",
                    web::post().to(hub_handlers::request_email_change),
                )
                .route(
                    "/complete-email-change",
                    web::post().to(hub_handlers::complete_email_change),
                )
                .route("/set-language", web::post().to(hub_handlers::set_language))
                .route("/myinfo", web::post().to(hub_handlers::myinfo)),
        )
        // ─────────────────────────────────────────────────────────────────
        // Employer / Agency surfaces (shared handlers, kind per scope)
        // ─────────────────────────────────────────────────────────────────
        .service(member_scope("/employer", MemberKind::Employer))
        .service(member_scope("/agency", MemberKind::Agency));
}

/// One member-family scope. Registered twice, once per kind.
fn member_scope(
    prefix: &str,
    kind: MemberKind,
) -> actix_web::Scope {
    web::scope(prefix)
        .app_data(web::Data::new(kind))
        .route("/init-signup", web::post().to(member_handlers::init_signup))
        .route("/complete-signup", web::post().to(member_handlers::complete_signup))
        .route("/login", web::post().to(member_handlers::login))
        .route("/tfa", web::post().to(member_handlers::tfa))
        .route("/logout", web::post().to(member_handlers::logout))
        .route("/invite-user", web::post().to(member_handlers::invite_user))
        .route("/complete-setup", web::post().to(member_handlers::complete_setup))
        .route("/disable-user", web::post().to(member_handlers::disable_user))
        .route("/enable-user", web::post().to(member_handlers::enable_user))
        .route("/assign-role", web::post().to(member_handlers::assign_role))
        .route("/remove-role", web::post().to(member_handlers::remove_role))
        .route("/filter-users", web::post().to(member_handlers::filter_users))
        .route("/claim-domain", web::post().to(member_handlers::claim_domain))
        .route("/verify-domain", web::post().to(member_handlers::verify_domain))
        .route("/list-domains", web::post().to(member_handlers::list_domains))
        .route(
            "/get-domain-status",
            web::post().to(member_handlers::get_domain_status),
        )
        .route("/change-password", web::post().to(member_handlers::change_password))
        .route(
            "/request-password-reset",
            web::post().to(member_handlers::request_password_reset),
        )
        .route(
            "/complete-password-reset",
            web::post().to(member_handlers::complete_password_reset),
        )
        .route("/set-language", web::post().to(member_handlers::set_language))
        .route("/myinfo", web::post().to(member_handlers::myinfo))
}
