//! # Email Queue Repository
//!
//! Data access for the outbound email queue and its attempt log.
//!
//! ## Claim semantics
//!
//! [`EmailQueue::claim_batch`] selects up to B eligible rows with
//! `FOR UPDATE SKIP LOCKED` and then commits, leaving the rows `pending` in
//! the database. A crash between claim and send therefore loses nothing:
//! the rows are re-claimed on the next poll. The cost is that delivery is
//! at-least-once, never exactly-once.
//!
//! ## Eligibility
//!
//! A row is eligible when `status = 'pending'`, it has attempts left, and
//! its backoff window has elapsed. The retry schedule is
//! `[0, 1m, 5m, 30m, 2h]`, capped at the last entry.

use crate::email::{EmailAttempt, NewEmail, QueuedEmail};
use crate::errors::ApiError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Retry backoff, indexed by completed attempt count, in seconds.
/// Attempt counts past the end use the last entry.
pub const RETRY_SCHEDULE_SECS: [i64; 5] = [0, 60, 300, 1800, 7200];

/// Returns the backoff delay after `attempt_count` completed attempts.
pub fn backoff_secs(attempt_count: i32) -> i64 {
    let idx = (attempt_count.max(0) as usize).min(RETRY_SCHEDULE_SECS.len() - 1);
    RETRY_SCHEDULE_SECS[idx]
}

/// Returns `true` when a row with the given attempt history may be retried
/// at `now`.
pub fn backoff_elapsed(
    attempt_count: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_attempt_at {
        None => true,
        Some(last) => last + ChronoDuration::seconds(backoff_secs(attempt_count)) <= now,
    }
}

// =============================================================================
// QUEUE REPOSITORY
// =============================================================================

/// Repository over one email queue table pair.
///
/// The same shape backs the regional queue (`email_queue` /
/// `email_attempts`) and the global admin queue (`admin_email_queue` /
/// `admin_email_attempts`); the table names are fixed at construction.
#[derive(Debug, Clone)]
pub struct EmailQueue {
    pool: PgPool,
    queue_table: &'static str,
    attempts_table: &'static str,
}

impl EmailQueue {
    /// Regional queue (used by regional-api producers and regional-worker).
    pub fn regional(pool: PgPool) -> Self {
        Self {
            pool,
            queue_table: "email_queue",
            attempts_table: "email_attempts",
        }
    }

    /// Global admin queue (used by global-service).
    pub fn admin(pool: PgPool) -> Self {
        Self {
            pool,
            queue_table: "admin_email_queue",
            attempts_table: "admin_email_attempts",
        }
    }

    // =========================================================================
    // PRODUCER SIDE
    // =========================================================================

    /// Enqueues an email inside the caller's transaction.
    ///
    /// Taking the transaction is the whole point: the enqueue commits or
    /// rolls back together with the state change it reports, so an email is
    /// never sent for a change that didn't happen, and a change never
    /// silently loses its email.
    pub async fn enqueue(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        email: NewEmail,
    ) -> Result<Uuid, ApiError> {
        let row: (Uuid,) = sqlx::query_as(&format!(
            r#"
            INSERT INTO {} (
                kind, to_address, subject, text_body, html_body, status
            )
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING email_id
            "#,
            self.queue_table
        ))
        .bind(email.kind)
        .bind(&email.to_address)
        .bind(&email.subject)
        .bind(&email.text_body)
        .bind(&email.html_body)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.0)
    }

    // =========================================================================
    // CONSUMER SIDE
    // =========================================================================

    /// Claims up to `batch_size` eligible rows.
    ///
    /// Selection locks the rows (`FOR UPDATE SKIP LOCKED`) and commits
    /// immediately: rows stay `pending` so a crash before send retries
    /// them. The backoff CASE mirrors [`RETRY_SCHEDULE_SECS`].
    pub async fn claim_batch(
        &self,
        batch_size: i64,
        max_attempts: i32,
    ) -> Result<Vec<QueuedEmail>, ApiError> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<QueuedEmail> = sqlx::query_as(&format!(
            r#"
            SELECT email_id, kind, to_address, subject, text_body, html_body,
                   status, attempt_count, last_attempt_at, created_at, sent_at
            FROM {}
            WHERE status = 'pending'
              AND attempt_count < $1
              AND (
                last_attempt_at IS NULL
                OR last_attempt_at + make_interval(secs => CASE
                    WHEN attempt_count <= 0 THEN 0
                    WHEN attempt_count = 1 THEN 60
                    WHEN attempt_count = 2 THEN 300
                    WHEN attempt_count = 3 THEN 1800
                    ELSE 7200
                  END) <= NOW()
              )
            ORDER BY created_at
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            "#,
            self.queue_table
        ))
        .bind(max_attempts)
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(rows)
    }

    /// Records one delivery attempt and bumps the row's attempt bookkeeping.
    ///
    /// `error_message` is `None` for a successful hand-off to the relay.
    pub async fn record_attempt(
        &self,
        email_id: Uuid,
        error_message: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (email_id, error_message)
            VALUES ($1, $2)
            "#,
            self.attempts_table
        ))
        .bind(email_id)
        .bind(error_message)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET attempt_count = attempt_count + 1,
                last_attempt_at = NOW()
            WHERE email_id = $1
            "#,
            self.queue_table
        ))
        .bind(email_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Marks a row delivered.
    pub async fn mark_sent(&self, email_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = 'sent', sent_at = NOW()
            WHERE email_id = $1
            "#,
            self.queue_table
        ))
        .bind(email_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Marks a row permanently failed (max attempts reached).
    pub async fn mark_failed(&self, email_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = 'failed'
            WHERE email_id = $1
            "#,
            self.queue_table
        ))
        .bind(email_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Attempt history for a queue row, oldest first.
    pub async fn attempts(&self, email_id: Uuid) -> Result<Vec<EmailAttempt>, ApiError> {
        let rows = sqlx::query_as(&format!(
            r#"
            SELECT attempt_id, email_id, attempted_at, error_message
            FROM {}
            WHERE email_id = $1
            ORDER BY attempted_at
            "#,
            self.attempts_table
        ))
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_schedule_shape() {
        assert_eq!(backoff_secs(0), 0); // first attempt is immediate
        assert_eq!(backoff_secs(1), 60);
        assert_eq!(backoff_secs(2), 300);
        assert_eq!(backoff_secs(3), 1800);
        assert_eq!(backoff_secs(4), 7200);
        // capped past the end
        assert_eq!(backoff_secs(10), 7200);
        assert_eq!(backoff_secs(-1), 0);
    }

    #[test]
    fn test_backoff_elapsed_without_history() {
        assert!(backoff_elapsed(0, None, Utc::now()));
    }

    #[test]
    fn test_backoff_elapsed_respects_window() {
        let now = Utc::now();
        let just_failed = now - ChronoDuration::seconds(10);
        let long_ago = now - ChronoDuration::seconds(120);

        // one failed attempt -> 60s window
        assert!(!backoff_elapsed(1, Some(just_failed), now));
        assert!(backoff_elapsed(1, Some(long_ago), now));

        // two failed attempts -> 300s window
        assert!(!backoff_elapsed(2, Some(long_ago), now));
        assert!(backoff_elapsed(
            2,
            Some(now - ChronoDuration::seconds(301)),
            now
        ));
    }
}
