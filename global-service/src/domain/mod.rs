//! Admin-tier entities. Everything here lives in the global store only:
//! admins are a platform-wide set with no home region.

pub mod entities;

pub use entities::*;
