//! Global-store data access for the admin tier.

pub mod admin_repository;

pub use admin_repository::AdminRepository;
