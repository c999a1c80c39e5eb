//! # Org/Agency User Repository
//!
//! Regional-store data access for the two symmetric member families. One
//! implementation body serves both: the [`MemberKind`] fixed at
//! construction selects the table set, nothing else differs.
//!
//! The same query patterns as [`super::hub`] apply: hash-at-rest lookups,
//! `DELETE … RETURNING` single-use consumes, transactions passed in by the
//! service layer.

use crate::domain::{ActionToken, MemberKind, MemberRole, MemberUser, TfaChallenge, UserStatus};
use chrono::{DateTime, Utc};
use shared::ApiError;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Repository for one member family's regional data.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: PgPool,
    kind: MemberKind,
}

impl MemberRepository {
    pub fn new(pool: PgPool, kind: MemberKind) -> Self {
        Self { pool, kind }
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    /// Starts a regional transaction for the service layer to compose
    /// multi-step writes.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, ApiError> {
        Ok(self.pool.begin().await?)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// Inserts a member user row. Status and admin flag vary by flow:
    /// signup bootstraps `active` + admin, invitations start `invited`.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        org_id: Uuid,
        email: &str,
        password_hash: &str,
        full_name: &str,
        preferred_language: &str,
        status: UserStatus,
        is_admin: bool,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {}
                (user_id, org_id, email, password_hash, full_name,
                 preferred_language, status, auth_kind, is_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'email_password', $8)
            "#,
            self.kind.users_table()
        ))
        .bind(user_id)
        .bind(org_id)
        .bind(email)
        .bind(password_hash)
        .bind(full_name)
        .bind(preferred_language)
        .bind(status)
        .bind(is_admin)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Finds a user by email within one org (the same address may exist
    /// under several orgs).
    pub async fn find_by_email_and_org(
        &self,
        email: &str,
        org_id: Uuid,
    ) -> Result<Option<MemberUser>, ApiError> {
        let user = sqlx::query_as(&format!(
            r#"
            SELECT user_id, org_id, email, password_hash, full_name,
                   preferred_language, status, auth_kind, is_admin,
                   created_at, updated_at
            FROM {}
            WHERE email = $1 AND org_id = $2
            "#,
            self.kind.users_table()
        ))
        .bind(email)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<MemberUser>, ApiError> {
        let user = sqlx::query_as(&format!(
            r#"
            SELECT user_id, org_id, email, password_hash, full_name,
                   preferred_language, status, auth_kind, is_admin,
                   created_at, updated_at
            FROM {}
            WHERE user_id = $1
            "#,
            self.kind.users_table()
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Completes invitation setup: sets credentials and flips
    /// `invited → active`. Zero rows affected means the user was not in
    /// `invited` state (or vanished), which the caller rejects.
    pub async fn complete_setup(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        password_hash: &str,
        full_name: &str,
        preferred_language: &str,
    ) -> Result<bool, ApiError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET password_hash = $1,
                full_name = $2,
                preferred_language = $3,
                auth_kind = 'email_password',
                status = 'active',
                updated_at = NOW()
            WHERE user_id = $4 AND status = 'invited'
            "#,
            self.kind.users_table()
        ))
        .bind(password_hash)
        .bind(full_name)
        .bind(preferred_language)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Flips a user's status inside a composed transaction (the I5 guard
    /// lock lives in the same transaction).
    pub async fn set_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        status: UserStatus,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET status = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
            self.kind.users_table()
        ))
        .bind(status)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("user"));
        }
        Ok(())
    }

    pub async fn update_password(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(&format!(
            r#"
            UPDATE {}
            SET password_hash = $1, updated_at = NOW()
            WHERE user_id = $2 AND status = 'active'
            "#,
            self.kind.users_table()
        ))
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }

    pub async fn set_language(&self, user_id: Uuid, language: &str) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            UPDATE {}
            SET preferred_language = $1, updated_at = NOW()
            WHERE user_id = $2
            "#,
            self.kind.users_table()
        ))
        .bind(language)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Prefix filter over an org's users for the admin console. Matches
    /// email or full name, case-insensitive.
    pub async fn filter_users(
        &self,
        org_id: Uuid,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<MemberUser>, ApiError> {
        let pattern = format!("{}%", prefix);

        let users = sqlx::query_as(&format!(
            r#"
            SELECT user_id, org_id, email, password_hash, full_name,
                   preferred_language, status, auth_kind, is_admin,
                   created_at, updated_at
            FROM {}
            WHERE org_id = $1
              AND (email ILIKE $2 OR full_name ILIKE $2)
            ORDER BY email
            LIMIT $3
            "#,
            self.kind.users_table()
        ))
        .bind(org_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    pub async fn insert_session(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        remember_me: bool,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (token_hash, user_id, remember_me, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
            self.kind.sessions_table()
        ))
        .bind(token_hash)
        .bind(user_id)
        .bind(remember_me)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Resolves a live session token hash to its user.
    pub async fn session_user(&self, token_hash: &str) -> Result<Option<MemberUser>, ApiError> {
        let user = sqlx::query_as(&format!(
            r#"
            SELECT u.user_id, u.org_id, u.email, u.password_hash, u.full_name,
                   u.preferred_language, u.status, u.auth_kind, u.is_admin,
                   u.created_at, u.updated_at
            FROM {} s
            JOIN {} u ON u.user_id = s.user_id
            WHERE s.token_hash = $1
              AND s.expires_at > NOW()
            "#,
            self.kind.sessions_table(),
            self.kind.users_table()
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn delete_session(&self, token_hash: &str) -> Result<(), ApiError> {
        sqlx::query(&format!(
            "DELETE FROM {} WHERE token_hash = $1",
            self.kind.sessions_table()
        ))
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
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1",
            self.kind.sessions_table()
        ))
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Pool-level session purge for the best-effort cleanup after a
    /// disable commits. Failure here leaves sessions to expire naturally,
    /// which is the accepted degraded mode.
    pub async fn delete_all_sessions_best_effort(&self, user_id: Uuid) -> Result<u64, ApiError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1",
            self.kind.sessions_table()
        ))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_other_sessions(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        keep_token_hash: &str,
    ) -> Result<u64, ApiError> {
        let result = sqlx::query(&format!(
            r#"
            DELETE FROM {}
            WHERE user_id = $1 AND token_hash <> $2
            "#,
            self.kind.sessions_table()
        ))
        .bind(user_id)
        .bind(keep_token_hash)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // TFA CHALLENGES
    // =========================================================================

    pub async fn insert_tfa(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (token_hash, user_id, code, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
            self.kind.tfa_table()
        ))
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
    ) -> Result<Option<TfaChallenge>, ApiError> {
        let challenge = sqlx::query_as(&format!(
            r#"
            SELECT token_hash, user_id, code, expires_at, created_at
            FROM {}
            WHERE token_hash = $1 AND expires_at > NOW()
            FOR UPDATE
            "#,
            self.kind.tfa_table()
        ))
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
        sqlx::query(&format!(
            "DELETE FROM {} WHERE token_hash = $1",
            self.kind.tfa_table()
        ))
        .bind(token_hash)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    // =========================================================================
    // PASSWORD RESET TOKENS
    // =========================================================================

    pub async fn insert_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
            self.kind.reset_tokens_table()
        ))
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Atomic single-use consume; replay finds nothing and 401s.
    pub async fn consume_password_reset(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
    ) -> Result<Option<ActionToken>, ApiError> {
        let token = sqlx::query_as(&format!(
            r#"
            DELETE FROM {}
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
            self.kind.reset_tokens_table()
        ))
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(token)
    }

    // =========================================================================
    // INVITATION TOKENS
    // =========================================================================

    pub async fn insert_invitation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
            self.kind.invitation_tokens_table()
        ))
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
    ) -> Result<Option<ActionToken>, ApiError> {
        let token = sqlx::query_as(&format!(
            r#"
            DELETE FROM {}
            WHERE token_hash = $1 AND expires_at > NOW()
            RETURNING token_hash, user_id, expires_at, created_at
            "#,
            self.kind.invitation_tokens_table()
        ))
        .bind(token_hash)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(token)
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// All roles held by a user.
    pub async fn roles(&self, user_id: Uuid) -> Result<Vec<MemberRole>, ApiError> {
        let rows: Vec<(MemberRole,)> = sqlx::query_as(&format!(
            "SELECT role FROM {} WHERE user_id = $1",
            self.kind.roles_table()
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Grants a role inside a composed transaction.
    ///
    /// ## Errors
    ///
    /// 409 `role` - the user already holds it.
    pub async fn assign_role(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), ApiError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (user_id, role)
            VALUES ($1, $2)
            "#,
            self.kind.roles_table()
        ))
        .bind(user_id)
        .bind(role)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some(&format!("{}_pkey", self.kind.roles_table())) {
                    return ApiError::conflict("role");
                }
            }
            ApiError::DatabaseError(e)
        })?;

        Ok(())
    }

    /// Revokes a role inside a composed transaction (the superadmin guard
    /// runs first, under the same transaction's locks).
    pub async fn remove_role(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND role = $2",
            self.kind.roles_table()
        ))
        .bind(user_id)
        .bind(role)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("role"));
        }
        Ok(())
    }

    /// Locks and returns the user ids of every **active** superadmin of an
    /// org. Runs `FOR UPDATE` over the role rows so racing
    /// disable/remove-role attempts serialize on the same lock set; the
    /// admin-floor invariant is then checked against a stable snapshot.
    pub async fn active_superadmins_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        org_id: Uuid,
    ) -> Result<Vec<Uuid>, ApiError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
            r#"
            SELECT r.user_id
            FROM {} r
            JOIN {} u ON u.user_id = r.user_id
            WHERE r.role = 'superadmin'
              AND u.org_id = $1
              AND u.status = 'active'
            FOR UPDATE OF r
            "#,
            self.kind.roles_table(),
            self.kind.users_table()
        ))
        .bind(org_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    // =========================================================================
    // STATUS HELPERS
    // =========================================================================

    /// Guard used by every authenticated member operation.
    pub fn require_active(user: &MemberUser) -> Result<(), ApiError> {
        match user.status {
            UserStatus::Active => Ok(()),
            _ => Err(ApiError::unprocessable("account not active")),
        }
    }
}
