//! Business logic for the admin tier.

pub mod admin_service;
pub mod messages;

pub use admin_service::AdminService;
