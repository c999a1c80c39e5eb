//! # Admin Repository
//!
//! Data access for admin users and their token families. Same patterns as
//! the regional repositories: hash-at-rest lookups, `expires_at > NOW()`
//! on every live-token read, `DELETE … RETURNING` for single-use
//! consumption. Everything is single-store, so no flow here ever needs a
//! compensation.

use crate::domain::{AdminActionToken, AdminStatus, AdminTfaChallenge, AdminUser};
use chrono::{DateTime, Utc};
use shared::ApiError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, ApiError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn find_by_email(&self, email: &str) -> Result<Option<AdminUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT user_id, email, password_hash, full_name, status,
                   created_at, updated_at
            FROM admin_users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<AdminUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT user_id, email, password_hash, full_name, status,
                   created_at, updated_at
            FROM admin_users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Inserts an invited admin.
    ///
    /// ## Errors
    ///
    /// 409 `email` - an admin with this address already exists.
    pub async fn insert_invited(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        email: &str,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO admin_users (user_id, email, password_hash, full_name, status)
            VALUES ($1, $2, '', '', 'invited')
            "#,
        )
        .bind(user_id)
        .bind(email)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("admin_users_email_key") {
                    return ApiError::conflict("email");
                }
            }
            ApiError::DatabaseError(e)
        })?;

        Ok(())
    }

    /// Completes invitation setup: `invited → active` with credentials.
    pub async fn complete_setup(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        password_hash: &str,
        full_name: &str,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE admin_users
            SET password_hash = $1, full_name = $2, status = 'active',
                updated_at = NOW()
            WHERE user_id = $3 AND status = 'invited'
            "#,
        )
        .bind(password_hash)
        .bind(full_name)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn update_password(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE admin_users
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

    // =========================================================================
    // SESSIONS
    // =========================================================================

    pub async fn insert_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO admin_sessions (token_hash, user_id, expires_at)
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

    pub async fn session_user(&self, token_hash: &str) -> Result<Option<AdminUser>, ApiError> {
        let user = sqlx::query_as(
            r#"
            SELECT u.user_id, u.email, u.password_hash, u.full_name, u.status,
                   u.created_at, u.updated_at
            FROM admin_sessions s
            JOIN admin_users u ON u.user_id = s.user_id
            WHERE s.token_hash = $1
              AND s.expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn delete_session(&self, token_hash: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM admin_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_all_sessions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM admin_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // TFA
    // =========================================================================

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
            INSERT INTO admin_tfa_challenges (token_hash, user_id, code, expires_at)
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

    pub async fn tfa_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<AdminTfaChallenge>, ApiError> {
        let challenge = sqlx::query_as(
            r#"
            SELECT token_hash, user_id, code, expires_at, created_at
            FROM admin_tfa_challenges
            WHERE token_hash = $1 AND expires_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(challenge)
    }

    pub async fn delete_tfa(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM admin_tfa_challenges WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    // =========================================================================
    // SINGLE-USE TOKENS (RESET, INVITATION)
    // =========================================================================

    pub async fn insert_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO admin_password_reset_tokens (token_hash, user_id, expires_at)
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

    pub async fn consume_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<AdminActionToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            DELETE FROM admin_password_reset_tokens
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(token)
    }

    pub async fn insert_invitation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO admin_invitation_tokens (token_hash, user_id, expires_at)
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

    pub async fn consume_invitation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<AdminActionToken>, ApiError> {
        let token = sqlx::query_as(
            r#"
            DELETE FROM admin_invitation_tokens
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
    // STATUS
    // =========================================================================

    pub fn require_active(user: &AdminUser) -> Result<(), ApiError> {
        match user.status {
            AdminStatus::Active => Ok(()),
            _ => Err(ApiError::unprocessable("account not active")),
        }
    }
}
