//! # Global Background Jobs
//!
//! The leader instance (the one started with `JOBS_ENABLED=true`) runs:
//!
//! - the **admin email queue worker** (same loop as a regional worker,
//!   over `admin_email_queue`), and
//! - the **global token GC**: expired admin sessions/challenges/tokens
//!   and expired hub/org signup tokens.
//!
//! Exactly one instance may enable jobs; the flag is deployment
//! configuration, mirroring the regional worker's singleton contract.

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};

/// Global-store tables whose rows die at `expires_at`.
const EXPIRING_TABLES: &[&str] = &[
    "admin_sessions",
    "admin_tfa_challenges",
    "admin_password_reset_tokens",
    "admin_invitation_tokens",
    "hub_signup_tokens",
    "org_signup_tokens",
];

/// One sweep across the global token tables. Returns total rows removed.
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

/// The global GC loop.
pub async fn run_gc(
    pool: PgPool,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(interval);
    info!(interval_secs = interval.as_secs(), "Global token GC started");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match sweep(&pool).await {
                    Ok(0) => {}
                    Ok(removed) => info!(removed, "Expired global tokens removed"),
                    Err(e) => error!(error = %e, "Global token GC sweep failed"),
                }
            }
            _ = shutdown.changed() => {
                info!("Global token GC shutting down");
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
    fn test_signup_tokens_are_collected() {
        assert!(EXPIRING_TABLES.contains(&"hub_signup_tokens"));
        assert!(EXPIRING_TABLES.contains(&"org_signup_tokens"));
    }
}
