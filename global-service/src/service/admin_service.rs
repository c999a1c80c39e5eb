//! # Admin Identity Service
//!
//! The admin state machine: TFA login, invitations, password lifecycle.
//! Structurally the same discipline as the regional families, but every
//! write is a single global-store transaction - there is no second tier to
//! compensate against.
//!
//! Admin tokens are **bare** 64-hex opaque values: there is no region to
//! route to, so the `<region>-` prefix would be dead weight. Shape
//! validation still rejects anything else with an opaque 401.

use crate::domain::{AdminStatus, AdminUser};
use crate::repository::AdminRepository;
use crate::service::messages;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::config::TokenTtlConfig;
use shared::email::queue::EmailQueue;
use shared::token::{self, OPAQUE_LEN};
use shared::{password, ApiError};
use tracing::{info, warn};
use uuid::Uuid;

fn expiry(ttl: std::time::Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(ttl.as_secs() as i64)
}

/// Validates the bare-opaque admin token shape; the authoritative check
/// is always the store lookup of its hash.
pub fn parse_admin_token(raw: &str) -> Result<String, ApiError> {
    if raw.len() != OPAQUE_LEN
        || !raw
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    {
        return Err(ApiError::Unauthorized);
    }
    Ok(token::hash_opaque(raw))
}

/// Admin identity state machine.
#[derive(Clone)]
pub struct AdminService {
    repo: AdminRepository,
    emails: EmailQueue,
    ttls: TokenTtlConfig,
}

impl AdminService {
    pub fn new(repo: AdminRepository, emails: EmailQueue, ttls: TokenTtlConfig) -> Self {
        Self { repo, emails, ttls }
    }

    pub fn repo(&self) -> &AdminRepository {
        &self.repo
    }

    /// Resolves a session token to its active admin.
    pub async fn authenticate(&self, raw_token: &str) -> Result<(AdminUser, String), ApiError> {
        let session_hash = parse_admin_token(raw_token)?;
        let user = self
            .repo
            .session_user(&session_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        AdminRepository::require_active(&user)?;
        Ok((user, session_hash))
    }

    // =========================================================================
    // LOGIN / TFA
    // =========================================================================

    pub async fn login(&self, email: &str, password_plain: &str) -> Result<String, ApiError> {
        let user = self.repo.find_by_email(email).await?.ok_or_else(|| {
            warn!("Login attempt for unknown admin");
            ApiError::Unauthorized
        })?;

        if user.status != AdminStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }
        if !password::verify(password_plain, &user.password_hash) {
            warn!(user_id = %user.user_id, "Failed admin login attempt");
            return Err(ApiError::Unauthorized);
        }

        let tfa_token = token::generate_opaque();
        let code = token::generate_tfa_code();

        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_tfa(
                &mut tx,
                &token::hash_opaque(&tfa_token),
                user.user_id,
                &code,
                expiry(self.ttls.admin_tfa),
            )
            .await?;
        self.emails
            .enqueue(&mut tx, messages::tfa_email(&user.email, &code))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Admin TFA challenge issued");
        Ok(tfa_token)
    }

    pub async fn verify_tfa(&self, raw_token: &str, code: &str) -> Result<String, ApiError> {
        let tfa_hash = parse_admin_token(raw_token)?;

        let mut tx = self.repo.begin().await?;
        let challenge = self
            .repo
            .tfa_for_update(&mut tx, &tfa_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !token::constant_time_eq(code, &challenge.code) {
            return Err(ApiError::Unauthorized);
        }

        let user = self
            .repo
            .find_by_id(challenge.user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        if user.status != AdminStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        let session_token = token::generate_opaque();
        self.repo.delete_tfa(&mut tx, &tfa_hash).await?;
        self.repo
            .insert_session(
                &mut tx,
                &token::hash_opaque(&session_token),
                user.user_id,
                expiry(self.ttls.admin_session),
            )
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Admin session created");
        Ok(session_token)
    }

    pub async fn logout(&self, session_hash: &str) -> Result<(), ApiError> {
        self.repo.delete_session(session_hash).await
    }

    // =========================================================================
    // INVITATION
    // =========================================================================

    /// Invites a new admin. One global transaction: invited user row,
    /// invitation token, email.
    pub async fn invite_admin(&self, inviter: &AdminUser, email: &str) -> Result<(), ApiError> {
        let user_id = Uuid::new_v4();
        let invitation_token = token::generate_opaque();

        let mut tx = self.repo.begin().await?;
        self.repo.insert_invited(&mut tx, user_id, email).await?;
        self.repo
            .insert_invitation(
                &mut tx,
                &token::hash_opaque(&invitation_token),
                user_id,
                expiry(self.ttls.invitation),
            )
            .await?;
        self.emails
            .enqueue(
                &mut tx,
                messages::invitation_email(email, &inviter.full_name, &invitation_token),
            )
            .await?;
        tx.commit().await?;

        info!(invited_user_id = %user_id, "Admin invited");
        Ok(())
    }

    pub async fn complete_setup(
        &self,
        raw_token: &str,
        password_plain: &str,
        full_name: &str,
    ) -> Result<(), ApiError> {
        let invitation_hash = parse_admin_token(raw_token)?;
        let password_hash = password::hash(password_plain)?;

        let mut tx = self.repo.begin().await?;
        let invitation = self
            .repo
            .consume_invitation(&mut tx, &invitation_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let updated = self
            .repo
            .complete_setup(&mut tx, invitation.user_id, &password_hash, full_name)
            .await?;
        if !updated {
            return Err(ApiError::unprocessable("account not in invited state"));
        }
        tx.commit().await?;

        info!(user_id = %invitation.user_id, "Admin setup completed");
        Ok(())
    }

    // =========================================================================
    // PASSWORD LIFECYCLE
    // =========================================================================

    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let user = match self.repo.find_by_email(email).await? {
            Some(u) if u.status == AdminStatus::Active => u,
            _ => {
                info!("Password reset requested for unknown or inactive admin");
                return Ok(());
            }
        };

        let reset_token = token::generate_opaque();

        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_password_reset(
                &mut tx,
                &token::hash_opaque(&reset_token),
                user.user_id,
                expiry(self.ttls.password_reset),
            )
            .await?;
        self.emails
            .enqueue(
                &mut tx,
                messages::password_reset_email(&user.email, &reset_token),
            )
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Admin password reset token issued");
        Ok(())
    }

    pub async fn complete_password_reset(
        &self,
        raw_token: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let reset_hash = parse_admin_token(raw_token)?;
        let password_hash = password::hash(new_password)?;

        let mut tx = self.repo.begin().await?;
        let consumed = self
            .repo
            .consume_password_reset(&mut tx, &reset_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        self.repo
            .update_password(&mut tx, consumed.user_id, &password_hash)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized => ApiError::unprocessable("account not active"),
                other => other,
            })?;
        let ended = self.repo.delete_all_sessions(&mut tx, consumed.user_id).await?;
        tx.commit().await?;

        info!(user_id = %consumed.user_id, sessions_ended = ended, "Admin password reset completed");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_token_shape() {
        let opaque = token::generate_opaque();
        assert!(parse_admin_token(&opaque).is_ok());

        // Region-prefixed tokens are not admin tokens.
        assert!(parse_admin_token(&format!("ind1-{}", opaque)).is_err());
        assert!(parse_admin_token("short").is_err());
        assert!(parse_admin_token(&opaque.to_uppercase()).is_err());
    }

    #[test]
    fn test_admin_token_hash_matches_shared_scheme() {
        let opaque = token::generate_opaque();
        assert_eq!(parse_admin_token(&opaque).unwrap(), token::hash_opaque(&opaque));
    }
}
