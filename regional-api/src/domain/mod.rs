//! # Domain Layer
//!
//! Entities and enums for both tiers the regional API node touches: the
//! global routing directory and this region's own store.

pub mod entities;

pub use entities::*;
