//! # Token & Session Garbage Collection
//!
//! Periodically deletes expired rows from every regional token table.
//! Expiry is already enforced at read time (`expires_at > NOW()` in every
//! lookup), so this loop is hygiene: it keeps the tables small and the
//! dead secrets gone.

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};

/// Every regional table whose rows die at `expires_at`.
const EXPIRING_TABLES: &[&str] = &[
    "hub_sessions",
    "hub_tfa_challenges",
    "hub_password_reset_tokens",
    "hub_email_change_tokens",
    "org_sessions",
    "org_tfa_challenges",
    "org_password_reset_tokens",
    "org_invitation_tokens",
    "agency_sessions",
    "agency_tfa_challenges",
    "agency_password_reset_tokens",
    "agency_invitation_tokens",
];

/// One sweep across all token tables. Returns total rows removed.
pub async fn sweep(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let mut total = 0;

    for table in EXPIRING_TABLES {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE expires_at <= NOW()", table))
            .execute(pool)
            .await?;
        total += result.rows_affected();
    }

    Ok(total)
}

/// The GC loop: sweep every `CLEANUP_INTERVAL` until shutdown.
pub async fn run(pool: PgPool, interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
    let mut tick = tokio::time::interval(interval);
    info!(interval_secs = interval.as_secs(), "Token GC started");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match sweep(&pool).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Expired tokens removed"),
                    Err(e) => error!(error = %e, "Token GC sweep failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("Token GC shutting down");
                break;
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_family_is_swept() {
        for family in ["hub", "org", "agency"] {
            assert!(
                EXPIRING_TABLES
                    .iter()
                    .filter(|t| t.starts_with(family))
                    .count()
                    >= 3,
                "family {} missing from GC table list",
                family
            );
        }
    }
}
