//! # Global Directory Repository
//!
//! All access to the global routing tier from a regional API node.
//!
//! ## What lives here
//!
//! - Routing reads: email hash → home region, domain → owning org,
//!   signup token → target region. These back both the region router and
//!   the login handlers.
//! - The **global half of every cross-tier SAGA**: each `commit_*` method
//!   is one global transaction, and each has a `compensate_*` inverse that
//!   the service layer invokes if the regional half fails afterwards.
//!
//! ## Conflict mapping
//!
//! Unique-constraint violations are mapped to 409 by constraint name, the
//! same way the regional repositories do it. Constraint names are part of
//! the schema contract in `db/migrations/global`.

use crate::domain::{
    DomainEntry, HubDirectoryEntry, HubSignupToken, MemberDirectoryEntry, MemberKind,
    OrgDirectoryEntry, OrgSignupToken,
};
use chrono::{DateTime, Utc};
use shared::{ApiError, Region};
use sqlx::PgPool;
use uuid::Uuid;

/// Maps a unique violation on `constraint` to a 409, everything else to a
/// plain database error.
fn conflict_on(e: sqlx::Error, constraint: &str, resource: &str) -> ApiError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some(constraint) {
            return ApiError::conflict(resource);
        }
    }
    ApiError::DatabaseError(e)
}

/// Repository over the global directory store.
///
/// # Thread Safety
///
/// `GlobalDirectory` is `Send + Sync` because `PgPool` internally uses
/// `Arc`; clone freely across handlers.
#[derive(Debug, Clone)]
pub struct GlobalDirectory {
    pool: PgPool,
}

impl GlobalDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // ROUTING READS
    // =========================================================================

    /// Hub routing entry by email hash. Drives login routing and email
    /// uniqueness checks.
    pub async fn hub_entry_by_email_hash(
        &self,
        email_hash: &str,
    ) -> Result<Option<HubDirectoryEntry>, ApiError> {
        let entry = sqlx::query_as(
            r#"
            SELECT user_id, handle, email_hash, home_region, created_at
            FROM hub_user_directory
            WHERE email_hash = $1
            "#,
        )
        .bind(email_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Hub routing entry by user UUID (myinfo reads the handle from here).
    pub async fn hub_entry_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<HubDirectoryEntry>, ApiError> {
        let entry = sqlx::query_as(
            r#"
            SELECT user_id, handle, email_hash, home_region, created_at
            FROM hub_user_directory
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// The org owning `domain` within one family, if any.
    pub async fn org_by_domain(
        &self,
        kind: MemberKind,
        domain: &str,
    ) -> Result<Option<DomainEntry>, ApiError> {
        let entry = sqlx::query_as(&format!(
            r#"
            SELECT domain, org_id, home_region, created_at
            FROM {}
            WHERE domain = $1
            "#,
            kind.domains_table()
        ))
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Org routing entry by UUID.
    pub async fn org_entry(
        &self,
        kind: MemberKind,
        org_id: Uuid,
    ) -> Result<Option<OrgDirectoryEntry>, ApiError> {
        let entry = sqlx::query_as(&format!(
            r#"
            SELECT org_id, display_name, home_region, created_at
            FROM {}
            WHERE org_id = $1
            "#,
            kind.org_directory_table()
        ))
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Org user routing entry by `(email_hash, org)`. Drives org/agency
    /// login routing.
    pub async fn member_entry(
        &self,
        kind: MemberKind,
        email_hash: &str,
        org_id: Uuid,
    ) -> Result<Option<MemberDirectoryEntry>, ApiError> {
        let entry = sqlx::query_as(&format!(
            r#"
            SELECT user_id, email_hash, org_id, home_region, created_at
            FROM {}
            WHERE email_hash = $1 AND org_id = $2
            "#,
            kind.member_directory_table()
        ))
        .bind(email_hash)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Whether `domain` is already owned by anyone, in either family.
    pub async fn domain_taken(&self, domain: &str) -> Result<bool, ApiError> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM employer_domains WHERE domain = $1)
                OR EXISTS (SELECT 1 FROM agency_domains WHERE domain = $1)
            "#,
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    // =========================================================================
    // HUB SIGNUP TOKENS
    // =========================================================================

    /// Stores a hub signup token (hashed).
    pub async fn create_hub_signup_token(
        &self,
        token_hash: &str,
        email: &str,
        email_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_signup_tokens (token_hash, email, email_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_hash)
        .bind(email)
        .bind(email_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Removes a hub signup token outright. Used when the verification
    /// email could not be enqueued - the token would be unreachable.
    pub async fn delete_hub_signup_token(&self, token_hash: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM hub_signup_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// A live (unexpired, unconsumed) hub signup token.
    pub async fn hub_signup_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<HubSignupToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            SELECT token_hash, email_hash, email, expires_at, consumed_at, created_at
            FROM hub_signup_tokens
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    // =========================================================================
    // HUB SIGNUP SAGA (GLOBAL HALF)
    // =========================================================================

    /// Forward step: creates the hub directory entry and consumes the
    /// signup token, atomically.
    ///
    /// ## Errors
    ///
    /// - 409 `handle` - handle already taken
    /// - 409 `email` - an active hub account already uses this address
    /// - 401 - the token was consumed or expired under us
    pub async fn commit_hub_signup(
        &self,
        user_id: Uuid,
        handle: &str,
        email_hash: &str,
        home_region: Region,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO hub_user_directory (user_id, handle, email_hash, home_region)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(handle)
        .bind(email_hash)
        .bind(home_region)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("hub_user_directory_handle_key") => {
                        return ApiError::conflict("handle");
                    }
                    Some("hub_user_directory_email_hash_key") => {
                        return ApiError::conflict("email");
                    }
                    _ => {}
                }
            }
            ApiError::DatabaseError(e)
        })?;

        let consumed = sqlx::query(
            r#"
            UPDATE hub_signup_tokens
            SET consumed_at = NOW()
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            // Raced: someone consumed this token between our read and now.
            tx.rollback().await?;
            return Err(ApiError::Unauthorized);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Compensating inverse of [`commit_hub_signup`](Self::commit_hub_signup):
    /// deletes the directory entry and un-consumes the token.
    ///
    /// Returns an error (for the caller to raise as a CONSISTENCY_ALERT)
    /// if the delete touched no rows - the entry vanished under us.
    pub async fn compensate_hub_signup(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM hub_user_directory WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE hub_signup_tokens
            SET consumed_at = NULL
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::internal(
                "compensation found no directory entry to delete",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // ORG SIGNUP TOKENS
    // =========================================================================

    /// Stores an employer/agency signup token carrying the claimed domain
    /// and the DNS TXT token.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_org_signup_token(
        &self,
        token_hash: &str,
        kind: MemberKind,
        domain: &str,
        email: &str,
        email_hash: &str,
        dns_token: &str,
        home_region: Region,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO org_signup_tokens
                (token_hash, family, domain, email, email_hash, dns_token,
                 home_region, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .bind(domain)
        .bind(email)
        .bind(email_hash)
        .bind(dns_token)
        .bind(home_region)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// A live org signup token for the given family.
    pub async fn org_signup_token(
        &self,
        kind: MemberKind,
        token_hash: &str,
    ) -> Result<Option<OrgSignupToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            SELECT token_hash, family, domain, email_hash, email, dns_token,
                   home_region, expires_at, consumed_at, created_at
            FROM org_signup_tokens
            WHERE token_hash = $1
              AND family = $2
              AND consumed_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Routing read for the proxy: target region of a live org signup
    /// token, either family.
    pub async fn org_signup_token_region(
        &self,
        token_hash: &str,
    ) -> Result<Option<Region>, ApiError> {
        let row: Option<(Region,)> = sqlx::query_as(
            r#"
            SELECT home_region
            FROM org_signup_tokens
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.0))
    }

    // =========================================================================
    // ORG SIGNUP SAGA (GLOBAL HALF)
    // =========================================================================

    /// Forward step: creates the org directory entry, its domain row, the
    /// bootstrap user's directory entry, and consumes the signup token,
    /// atomically.
    #[allow(clippy::too_many_arguments)]
    pub async fn commit_org_signup(
        &self,
        kind: MemberKind,
        org_id: Uuid,
        display_name: &str,
        domain: &str,
        user_id: Uuid,
        email_hash: &str,
        home_region: Region,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (org_id, display_name, home_region)
            VALUES ($1, $2, $3)
            "#,
            kind.org_directory_table()
        ))
        .bind(org_id)
        .bind(display_name)
        .bind(home_region)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (domain, org_id, home_region)
            VALUES ($1, $2, $3)
            "#,
            kind.domains_table()
        ))
        .bind(domain)
        .bind(org_id)
        .bind(home_region)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, &format!("{}_pkey", kind.domains_table()), "domain"))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_id, email_hash, org_id, home_region)
            VALUES ($1, $2, $3, $4)
            "#,
            kind.member_directory_table()
        ))
        .bind(user_id)
        .bind(email_hash)
        .bind(org_id)
        .bind(home_region)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on(
                e,
                &format!("{}_email_hash_org_id_key", kind.member_directory_table()),
                "email",
            )
        })?;

        let consumed = sqlx::query(
            r#"
            UPDATE org_signup_tokens
            SET consumed_at = NOW()
            WHERE token_hash = $1
              AND consumed_at IS NULL
              AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(ApiError::Unauthorized);
        }

        tx.commit().await?;
        Ok(())
    }

    /// Compensating inverse of [`commit_org_signup`](Self::commit_org_signup).
    pub async fn compensate_org_signup(
        &self,
        kind: MemberKind,
        org_id: Uuid,
        domain: &str,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1",
            kind.member_directory_table()
        ))
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE domain = $1 AND org_id = $2",
            kind.domains_table()
        ))
        .bind(domain)
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE org_id = $1",
            kind.org_directory_table()
        ))
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE org_signup_tokens
            SET consumed_at = NULL
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::internal(
                "compensation found no org directory entry to delete",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // INVITATION SAGA (GLOBAL HALF)
    // =========================================================================

    /// Forward step for invitations: directory entry for the invited user.
    ///
    /// ## Errors
    ///
    /// 409 `email` - this address already belongs to a user of this org.
    pub async fn create_member_entry(
        &self,
        kind: MemberKind,
        user_id: Uuid,
        email_hash: &str,
        org_id: Uuid,
        home_region: Region,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_id, email_hash, org_id, home_region)
            VALUES ($1, $2, $3, $4)
            "#,
            kind.member_directory_table()
        ))
        .bind(user_id)
        .bind(email_hash)
        .bind(org_id)
        .bind(home_region)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            conflict_on(
                e,
                &format!("{}_email_hash_org_id_key", kind.member_directory_table()),
                "email",
            )
        })?;

        Ok(())
    }

    /// Compensating inverse of
    /// [`create_member_entry`](Self::create_member_entry).
    pub async fn delete_member_entry(
        &self,
        kind: MemberKind,
        user_id: Uuid,
    ) -> Result<(), ApiError> {
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1",
            kind.member_directory_table()
        ))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::internal(
                "compensation found no member directory entry to delete",
            ));
        }
        Ok(())
    }

    // =========================================================================
    // HUB EMAIL CHANGE (GLOBAL HALF)
    // =========================================================================

    /// Whether any hub account already uses this email hash.
    pub async fn hub_email_hash_in_use(&self, email_hash: &str) -> Result<bool, ApiError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM hub_user_directory WHERE email_hash = $1)",
        )
        .bind(email_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Rotates a hub directory entry's email hash - the only legal
    /// mutation of a directory entry. Used both forward (old → new) and as
    /// its own compensating inverse (new → old).
    pub async fn set_hub_email_hash(
        &self,
        user_id: Uuid,
        email_hash: &str,
    ) -> Result<(), ApiError> {
        let updated = sqlx::query(
            r#"
            UPDATE hub_user_directory
            SET email_hash = $1
            WHERE user_id = $2
            "#,
        )
        .bind(email_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on(e, "hub_user_directory_email_hash_key", "email"))?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::not_found("user"));
        }
        Ok(())
    }

    // =========================================================================
    // DOMAIN CLAIMS (GLOBAL HALF)
    // =========================================================================

    /// Reserves `domain` for `org_id` in the global uniqueness table.
    ///
    /// ## Errors
    ///
    /// 409 `domain` - already owned by any entity in either family.
    pub async fn claim_domain(
        &self,
        kind: MemberKind,
        domain: &str,
        org_id: Uuid,
        home_region: Region,
    ) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        // A domain is claimable only if neither family owns it. The insert
        // below still carries the per-table constraint for same-family races.
        let taken: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM employer_domains WHERE domain = $1)
                OR EXISTS (SELECT 1 FROM agency_domains WHERE domain = $1)
            "#,
        )
        .bind(domain)
        .fetch_one(&mut *tx)
        .await?;

        if taken.0 {
            tx.rollback().await?;
            return Err(ApiError::conflict("domain"));
        }

        sqlx::query(&format!(
            r#"
            INSERT INTO {} (domain, org_id, home_region)
            VALUES ($1, $2, $3)
            "#,
            kind.domains_table()
        ))
        .bind(domain)
        .bind(org_id)
        .bind(home_region)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on(e, &format!("{}_pkey", kind.domains_table()), "domain"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Compensating inverse of [`claim_domain`](Self::claim_domain).
    pub async fn release_domain(
        &self,
        kind: MemberKind,
        domain: &str,
        org_id: Uuid,
    ) -> Result<(), ApiError> {
        let deleted = sqlx::query(&format!(
            "DELETE FROM {} WHERE domain = $1 AND org_id = $2",
            kind.domains_table()
        ))
        .bind(domain)
        .bind(org_id)
        .execute(&self.pool)
        .await?;

        if deleted.rows_affected() == 0 {
            return Err(ApiError::internal(
                "compensation found no domain row to delete",
            ));
        }
        Ok(())
    }
}
