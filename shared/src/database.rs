//! # PostgreSQL Connection Pools
//!
//! Database connection management for the platform's two storage tiers.
//!
//! ## Two-Tier Layout
//!
//! The platform runs one **global** store (routing directory, admin data)
//! and one **regional** store per region (all mutable PII and credentials).
//! Every pool in the system is opened through [`connect`] with an explicit
//! [`StoreTier`], so logs, startup failures, and health probes always say
//! *which* tier they are about - with identically-shaped Postgres URLs on
//! both sides, an untagged "pool created" line is useless during a
//! partial outage.
//!
//! ```text
//! ┌────────────────┬───────────────────────────────────────────┐
//! │ Process        │ Pools                                     │
//! ├────────────────┼───────────────────────────────────────────┤
//! │ regional-api   │ Global (read-mostly) + own Regional       │
//! │ regional-worker│ own Regional only                         │
//! │ global-service │ Global only                               │
//! └────────────────┴───────────────────────────────────────────┘
//! ```
//!
//! Cross-region pools do not exist: a request that belongs to another
//! region is reverse-proxied to that region's nodes, never queried
//! directly.
//!
//! Transactions hold their connection for their whole duration and release
//! it on commit or rollback; keep transactions short.

use crate::config::DatabaseConfig;
use crate::errors::ApiError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

// =============================================================================
// Store Tiers
// =============================================================================

/// Which of the two storage tiers a pool talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTier {
    /// The routing directory + admin tier (one per platform).
    Global,
    /// A region's own store (one per region; holds the PII).
    Regional,
}

impl StoreTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTier::Global => "global",
            StoreTier::Regional => "regional",
        }
    }
}

impl fmt::Display for StoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Pool Creation
// =============================================================================

/// Opens the connection pool for one store tier.
///
/// Called once per tier at startup. After the pool is up, a probe query
/// asks Postgres which database it actually landed in, and that name is
/// logged next to the tier - the fastest way to catch the classic
/// misconfiguration of both DSNs pointing at the same store.
///
/// ## Errors
///
/// Returns `ApiError::DatabaseError` if the URL is invalid, the store is
/// unreachable, authentication fails, or the probe query fails.
pub async fn connect(tier: StoreTier, config: &DatabaseConfig) -> Result<PgPool, ApiError> {
    let options = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .test_before_acquire(true);

    let pool = options.connect(&config.url).await.map_err(|e| {
        error!(store = tier.as_str(), error = %e, "Failed to open store pool");
        ApiError::DatabaseError(e)
    })?;

    let (database,): (String,) = sqlx::query_as("SELECT current_database()")
        .fetch_one(&pool)
        .await
        .map_err(|e| {
            error!(store = tier.as_str(), error = %e, "Store probe query failed");
            ApiError::DatabaseError(e)
        })?;

    info!(
        store = tier.as_str(),
        database = %database,
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Store pool ready"
    );

    Ok(pool)
}

// =============================================================================
// Health Check
// =============================================================================

/// Probes one tier's pool for the health endpoints.
///
/// A regional API node reports both of its tiers separately: losing the
/// global directory degrades routing and signup while local sessions keep
/// working, and the health body should say which half is gone.
pub async fn health_check(tier: StoreTier, pool: &PgPool) -> Result<(), ApiError> {
    sqlx::query("SELECT 1").execute(pool).await.map_err(|e| {
        error!(store = tier.as_str(), error = %e, "Store health probe failed");
        ApiError::DatabaseError(e)
    })?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Pool tests need live stores; the end-to-end suite provisions one
    // global and one regional database per region and drives these
    // helpers through the service binaries.

    #[test]
    fn test_tier_labels() {
        assert_eq!(StoreTier::Global.to_string(), "global");
        assert_eq!(StoreTier::Regional.to_string(), "regional");
        assert_ne!(StoreTier::Global, StoreTier::Regional);
    }
}
