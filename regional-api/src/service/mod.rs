//! # Service Layer
//!
//! Business logic between the HTTP handlers and the repositories.
//!
//! The three identity families share one discipline: every state change is
//! either a single regional transaction, or a global-then-regional pair
//! where the regional failure path eagerly runs the global inverse and a
//! failed inverse becomes a `CONSISTENCY_ALERT` (see
//! [`shared::telemetry::consistency_alert`]).

pub mod auth;
pub mod dns;
pub mod domains;
pub mod hub_identity;
pub mod member_identity;
pub mod messages;
pub mod rbac;

pub use domains::DomainService;
pub use hub_identity::HubIdentityService;
pub use member_identity::MemberIdentityService;
