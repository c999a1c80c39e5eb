//! # HTTP Layer
//!
//! Routes, handlers, and DTOs for the regional API node.

pub mod dto;
pub mod global_handlers;
pub mod hub_handlers;
pub mod member_handlers;
pub mod routes;
