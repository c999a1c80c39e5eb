//! # Admin Domain Entities
//!
//! Mirrors the regional user family shapes, minus everything regional:
//! admin tokens are bare opaque values (nothing to route - only this
//! service resolves them) and admin rows never reference a region.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of an admin account.
///
/// Transitions: `invited → active ↔ disabled` (disable is reserved for a
/// future admin-management surface; nothing flips it today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AdminStatus {
    Invited,
    Active,
    Disabled,
}

/// A platform administrator.
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub status: AdminStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending admin TFA challenge.
#[derive(Debug, Clone, FromRow)]
pub struct AdminTfaChallenge {
    pub token_hash: String,
    pub user_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Single-use admin token (password reset, invitation).
#[derive(Debug, Clone, FromRow)]
pub struct AdminActionToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
