//! # Route Configuration
//!
//! The `/admin/*` surface plus the health probe. The LB sends `/admin/*`
//! here and nowhere else.
//!
//! ```text
//! /
//! ├── health                        GET  → health_check
//! └── admin/
//!     ├── login                     POST → login
//!     ├── tfa                       POST → tfa
//!     ├── logout                    POST → logout
//!     ├── invite-admin              POST → invite_admin
//!     ├── complete-setup            POST → complete_setup
//!     ├── request-password-reset    POST → request_password_reset
//!     ├── complete-password-reset   POST → complete_password_reset
//!     └── myinfo                    POST → myinfo
//! ```

use actix_web::web;

use super::handlers;

/// Configures all routes for the global service.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health_check))
        .service(
            web::scope("/admin")
                .route("/login", web::post().to(handlers::login))
                .route("/tfa", web::post().to(handlers::tfa))
                .route("/logout", web::post().to(handlers::logout))
                .route("/invite-admin", web::post().to(handlers::invite_admin))
                .route("/complete-setup", web::post().to(handlers::complete_setup))
                .route(
                    "/request-password-reset",
                    web::post().to(handlers::request_password_reset),
                )
                .route(
                    "/complete-password-reset",
                    web::post().to(handlers::complete_password_reset),
                )
                .route("/myinfo", web::post().to(handlers::myinfo)),
        );
}
