//! # Hub User Repository
//!
//! Regional-store data access for the hub (job-seeker) family: users,
//! sessions, TFA challenges, password-reset and email-change tokens.
//!
//! ## Query Patterns
//!
//! | Pattern | Example |
//! |---|---|
//! | Hash-at-rest lookups | `WHERE token_hash = $1` (never raw tokens) |
//! | Live tokens | `AND expires_at > NOW()` |
//! | Single-use consume | `DELETE … RETURNING` (atomic, race-safe) |
//! | Parameterized | Always `$1, $2` (never string interpolation) |
//!
//! Multi-statement state changes take a `Transaction` so the service layer
//! controls the commit boundary; single-statement reads and writes take the
//! pool.

use crate::domain::{ActionToken, EmailChangeToken, HubUser, TfaChallenge, UserStatus};
use chrono::{DateTime, Utc};
use shared::ApiError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Repository for hub-family regional data.
#[derive(Debug, Clone)]
pub struct HubRepository {
    pool: PgPool,
}

impl HubRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Starts a regional transaction for the service layer to compose
    /// multi-step writes.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, ApiError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Inserts an active hub user. Part of the signup SAGA's regional
    /// transaction.
    pub async fn insert_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
        password_hash: &str,
        full_name: &str,
        preferred_language: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_users
                (user_id, email, password_hash, full_name, preferred_language,
                 status, auth_kind)
            VALUES ($1, $2, $3, $4, $5, 'active', 'email_password')
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(preferred_language)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Finds a hub user by email address.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<HubUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT user_id, email, password_hash, full_name, preferred_language,
                   status, auth_kind, created_at, updated_at
            FROM hub_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Finds a hub user by their stable UUID.
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<HubUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT user_id, email, password_hash, full_name, preferred_language,
                   status, auth_kind, created_at, updated_at
            FROM hub_users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Updates the password hash inside a composed transaction.
    pub async fn update_password(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE hub_users
            SET password_hash = $1, updated_at = NOW()
            WHERE user_id = $2 AND status = 'active'
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    /// Updates the stored email address (email-change completion).
    pub async fn update_email(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE hub_users
            SET email = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(email)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Persists the preferred language.
    pub async fn set_language(&self, user_id: Uuid, language: &str) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            UPDATE hub_users
            SET preferred_language = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
        )
        .bind(language)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Inserts a session row inside a composed transaction.
    pub async fn insert_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        remember_me: bool,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_sessions (token_hash, user_id, remember_me, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(remember_me)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Resolves a live session token hash to its user.
    ///
    /// Returns `None` for unknown, expired, or orphaned sessions; status
    /// checks are the caller's concern (a disabled user's lingering
    /// session must still fail with 401, which the service layer enforces
    /// via [`UserStatus`]).
    pub async fn session_user(&self, token_hash: &str) -> Result<Option<HubUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT u.user_id, u.email, u.password_hash, u.full_name,
                   u.preferred_language, u.status, u.auth_kind,
                   u.created_at, u.updated_at
            FROM hub_sessions s
            JOIN hub_users u ON u.user_id = s.user_id
            WHERE s.token_hash = $1
              AND s.expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Deletes one session (logout).
    pub async fn delete_session(&self, token_hash: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM hub_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Deletes every session of a user inside a composed transaction
    /// (password reset, email change).
    pub async fn delete_all_sessions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM hub_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every session of a user except the caller's own
    /// (change-password).
    pub async fn delete_other_sessions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        keep_token_hash: &str,
    ) -> Result<u64, ApiError> {
        let result = sqlx::query(
            r#"
            DELETE FROM hub_sessions
            WHERE user_id = $1 AND token_hash <> $2
            "#,
        )
        .bind(user_id)
        .bind(keep_token_hash)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // TFA CHALLENGES
    // =========================================================================

    /// Inserts a TFA challenge inside a composed transaction (paired with
    /// the TFA email enqueue).
    pub async fn insert_tfa(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_tfa_challenges (token_hash, user_id, code, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(code)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Locks a live TFA challenge for verification. The row stays until
    /// [`delete_tfa`](Self::delete_tfa) runs in the same transaction on a
    /// correct code; a wrong code rolls back and the challenge survives.
    pub async fn tfa_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<TfaChallenge>, ApiError> {
        let challenge = sqlx::query_as(
            r#"
            SELECT token_hash, user_id, code, expires_at, created_at
            FROM hub_tfa_challenges
            WHERE token_hash = $1 AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(challenge)
    }

    /// Consumes a TFA challenge after a successful code match.
    pub async fn delete_tfa(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM hub_tfa_challenges WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    // =========================================================================
    // PASSWORD RESET TOKENS
    // =========================================================================

    /// Inserts a password-reset token inside a composed transaction
    /// (paired with the reset email enqueue).
    pub async fn insert_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_password_reset_tokens (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Atomically consumes a live password-reset token.
    ///
    /// `DELETE … RETURNING` makes replay impossible: the second caller
    /// finds nothing and gets a 401.
    pub async fn consume_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<ActionToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            DELETE FROM hub_password_reset_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(token)
    }

    // =========================================================================
    // EMAIL CHANGE TOKENS
    // =========================================================================

    /// Inserts an email-change token carrying the new address as payload.
    pub async fn insert_email_change(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        new_email: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO hub_email_change_tokens (token_hash, user_id, new_email, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(new_email)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Reads a live email-change token without consuming it. The
    /// completion flow needs the payload before the global write; the
    /// consume happens later in the regional transaction.
    pub async fn email_change_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<EmailChangeToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            SELECT token_hash, user_id, new_email, expires_at, created_at
            FROM hub_email_change_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    /// Atomically consumes an email-change token.
    pub async fn consume_email_change(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<EmailChangeToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            DELETE FROM hub_email_change_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING token_hash, user_id, new_email, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(token)
    }

    // =========================================================================
    // STATUS HELPERS
    // =========================================================================

    /// Guard used by every authenticated hub operation.
    pub fn require_active(user: &HubUser) -> Result<(), ApiError> {
        match user.status {
            UserStatus::Active => Ok(()),
            _ => Err(ApiError::unprocessable("account not active")),
        }
    }
}
