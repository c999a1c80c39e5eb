//! # Domain Verification Repository
//!
//! Regional-store bookkeeping for claimed domains. The global domain table
//! only reserves the name; everything observable - token, status,
//! failure counters, timestamps - lives here and is the source of truth
//! for whether a domain is usable.
//!
//! The re-verification rate limit is enforced atomically: the
//! cooldown-guarded `UPDATE … RETURNING` both checks and stamps
//! `last_verification_requested_at` in one statement, so two racing
//! verify calls cannot both pass the window.

use crate::domain::{DomainVerification, MemberKind};
use chrono::{DateTime, Utc};
use shared::ApiError;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for one member family's domain verification rows.
#[derive(Debug, Clone)]
pub struct DomainRepository {
    pool: PgPool,
    kind: MemberKind,
}

impl DomainRepository {
    pub fn new(pool: PgPool, kind: MemberKind) -> Self {
        Self { pool, kind }
    }

    const COLUMNS: &'static str = "domain, org_id, verification_token, token_expires_at, \
         status, last_verified_at, consecutive_failures, \
         last_verification_requested_at, created_at";

    // =========================================================================
    // CLAIM
    // =========================================================================

    /// Inserts the verification row for a freshly claimed domain
    /// (`PENDING`, zero failures). Regional half of the claim SAGA.
    pub async fn insert(
        &self,
        domain: &str,
        org_id: Uuid,
        verification_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (domain, org_id, verification_token, token_expires_at,
                            status, consecutive_failures)
            VALUES ($1, $2, $3, $4, 'PENDING', 0)
            "#,
            self.kind.domain_verifications_table()
        ))
        .bind(domain)
        .bind(org_id)
        .bind(verification_token)
        .bind(token_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub async fn find(
        &self,
        domain: &str,
        org_id: Uuid,
    ) -> Result<Option<DomainVerification>, ApiError> {
        let row = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM {}
            WHERE domain = $1 AND org_id = $2
            "#,
            Self::COLUMNS,
            self.kind.domain_verifications_table()
        ))
        .bind(domain)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Pages an org's domains ordered by name; `cursor` is the last domain
    /// of the previous page (exclusive).
    pub async fn list(
        &self,
        org_id: Uuid,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DomainVerification>, ApiError> {
        let rows = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM {}
            WHERE org_id = $1 AND domain > $2
            ORDER BY domain
            LIMIT $3
            "#,
            Self::COLUMNS,
            self.kind.domain_verifications_table()
        ))
        .bind(org_id)
        .bind(cursor.unwrap_or(""))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // VERIFICATION FLOW
    // =========================================================================

    /// Atomically passes the per-domain cooldown gate and stamps the
    /// request timestamp. `None` with an existing row means rate-limited.
    pub async fn try_begin_verification(
        &self,
        domain: &str,
        org_id: Uuid,
        cooldown_secs: i64,
    ) -> Result<Option<DomainVerification>, ApiError> {
        let row = sqlx::query_as(&format!(
            r#"
            UPDATE {}
            SET last_verification_requested_at = NOW()
            WHERE domain = $1
              AND org_id = $2
              AND (
                last_verification_requested_at IS NULL
                OR last_verification_requested_at + make_interval(secs => $3) <= NOW()
              )
            RETURNING {}
            "#,
            self.kind.domain_verifications_table(),
            Self::COLUMNS
        ))
        .bind(domain)
        .bind(org_id)
        .bind(cooldown_secs as f64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Replaces an expired verification token and resets the request
    /// window so the fresh token can be checked immediately.
    pub async fn regenerate_token(
        &self,
        domain: &str,
        org_id: Uuid,
        verification_token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET verification_token = $3,
                token_expires_at = $4,
                last_verification_requested_at = NOW()
            WHERE domain = $1 AND org_id = $2
            "#,
            self.kind.domain_verifications_table()
        ))
        .bind(domain)
        .bind(org_id)
        .bind(verification_token)
        .bind(token_expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a successful TXT match: `VERIFIED`, counter reset.
    pub async fn mark_verified(&self, domain: &str, org_id: Uuid) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = 'VERIFIED',
                last_verified_at = NOW(),
                consecutive_failures = 0
            WHERE domain = $1 AND org_id = $2
            "#,
            self.kind.domain_verifications_table()
        ))
        .bind(domain)
        .bind(org_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a failed check. A `VERIFIED` domain that reaches the
    /// threshold without an intervening success degrades to `FAILING`.
    /// Returns the updated row.
    pub async fn record_failure(
        &self,
        domain: &str,
        org_id: Uuid,
        failing_threshold: i32,
    ) -> Result<DomainVerification, ApiError> {
        let row = sqlx::query_as(&format!(
            r#"
            UPDATE {}
            SET consecutive_failures = consecutive_failures + 1,
                status = CASE
                    WHEN status = 'VERIFIED' AND consecutive_failures + 1 >= $3
                        THEN 'FAILING'
                    ELSE status
                END
            WHERE domain = $1 AND org_id = $2
            RETURNING {}
            "#,
            self.kind.domain_verifications_table(),
            Self::COLUMNS
        ))
        .bind(domain)
        .bind(org_id)
        .bind(failing_threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
