//! # Vetchium - Shared Library
//!
//! Core shared functionality for all Vetchium backend processes.
//!
//! This crate provides common utilities, types, and services that are used
//! across the regional API nodes, the regional workers, and the global
//! service. It follows the DRY principle to avoid code duplication and
//! ensure consistency.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Processes                             │
//! │  ┌──────────────┐ ┌─────────────────┐ ┌────────────────┐    │
//! │  │ regional-api │ │ regional-worker │ │ global-service │    │
//! │  └──────┬───────┘ └────────┬────────┘ └───────┬────────┘    │
//! │         │                  │                  │             │
//! │         └──────────────────┴──────────────────┘             │
//! │                            │                                │
//! │                   ┌────────▼────────┐                       │
//! │                   │  shared crate   │ ◄── You are here      │
//! │                   └─────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose | Key Types |
//! |--------|---------|-----------|
//! | [`config`] | Environment-based configuration | [`AppConfig`] |
//! | [`errors`] | Standardized error handling | [`ApiError`], [`ApiResult`] |
//! | [`region`] | Closed region set and peer topology | [`Region`](region::Region) |
//! | [`token`] | Region-prefixed opaque tokens | [`RegionToken`](token::RegionToken) |
//! | [`database`] | Tier-tagged PostgreSQL pools | [`connect`](database::connect) |
//! | [`email`] | Durable outbound email queue + SMTP | [`EmailQueue`](email::queue::EmailQueue) |
//! | [`telemetry`] | Structured logging setup | [`init_tracing`](telemetry::init_tracing) |
//! | [`validation`] | Request validation helpers | Custom validators |
//!
//! ## Design Decisions
//!
//! 1. **Single source of truth**: All shared types live here to prevent drift
//! 2. **Two-tier data model**: the global directory routes, regional stores
//!    own all mutable PII; nothing in this crate blurs that line
//! 3. **Security first**: bcrypt credentials, hashed-at-rest tokens,
//!    constant-time comparisons
//! 4. **Observable by default**: structured logging built-in, never logging
//!    secrets or raw email addresses

pub mod config;
pub mod database;
pub mod email;
pub mod errors;
pub mod password;
pub mod region;
pub mod telemetry;
pub mod token;
pub mod validation;

// Re-exports for convenience - import commonly used types directly from `shared`
pub use config::AppConfig;
pub use errors::{ApiError, ApiResult};
pub use region::Region;
