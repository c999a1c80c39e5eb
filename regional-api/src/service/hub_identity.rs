//! # Hub Identity Service
//!
//! Signup, TFA login, sessions, password lifecycle, and email change for
//! the hub (job-seeker) family.
//!
//! ## Write discipline
//!
//! | Flow | Shape |
//! |---|---|
//! | request-signup | global token insert, then regional email tx |
//! | complete-signup | **SAGA**: global tx → regional tx → compensate |
//! | login / tfa | single regional tx |
//! | password reset / change | single regional tx |
//! | request-email-change | single regional tx |
//! | complete-email-change | **SAGA**: global update → regional tx → revert |
//!
//! The email-change ordering is global-first deliberately: if the regional
//! half fails and the compensation also fails, the directory points at the
//! *new* address while the regional store still holds the old one - the
//! user's old email stops resolving, but their account remains reachable
//! once they use the new address. The opposite ordering would strand them
//! entirely. Failed compensations emit `CONSISTENCY_ALERT` and stop.

use crate::domain::{HubUser, UserStatus};
use crate::repository::{GlobalDirectory, HubRepository};
use crate::service::messages;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::config::TokenTtlConfig;
use shared::email::queue::EmailQueue;
use shared::telemetry::consistency_alert;
use shared::token::{self, RegionToken};
use shared::{password, ApiError, Region};
use tracing::{info, warn};
use uuid::Uuid;

fn expiry(ttl: std::time::Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(ttl.as_secs() as i64)
}

/// Hub identity state machine.
#[derive(Clone)]
pub struct HubIdentityService {
    region: Region,
    directory: GlobalDirectory,
    repo: HubRepository,
    emails: EmailQueue,
    ttls: TokenTtlConfig,
}

impl HubIdentityService {
    pub fn new(
        region: Region,
        directory: GlobalDirectory,
        repo: HubRepository,
        emails: EmailQueue,
        ttls: TokenTtlConfig,
    ) -> Self {
        Self {
            region,
            directory,
            repo,
            emails,
            ttls,
        }
    }

    pub fn repo(&self) -> &HubRepository {
        &self.repo
    }

    // =========================================================================
    // SIGNUP
    // =========================================================================

    /// Step 1: records a signup token and queues the verification email.
    ///
    /// Always succeeds from the caller's point of view - an existing
    /// account produces the same outward behavior as a fresh signup,
    /// minus the email.
    pub async fn request_signup(&self, email: &str) -> Result<(), ApiError> {
        let email_hash = token::hash_email(email);

        if self
            .directory
            .hub_entry_by_email_hash(&email_hash)
            .await?
            .is_some()
        {
            info!(email_hash = %email_hash, "Signup requested for existing account");
            return Ok(());
        }

        // The token must be resolvable from any region (the home region is
        // chosen at completion), so it lives in the global store. The
        // prefix is the serving node's region purely to satisfy the wire
        // shape.
        let (signup_token, token_hash) = RegionToken::issue(self.region);
        self.directory
            .create_hub_signup_token(&token_hash, email, &email_hash, expiry(self.ttls.signup))
            .await?;

        let mut tx = self.repo.begin().await?;
        let enqueue = self
            .emails
            .enqueue(&mut tx, messages::hub_signup_email(email, &signup_token.to_string()))
            .await;

        match enqueue {
            Ok(_) => {
                tx.commit().await?;
                info!(email_hash = %email_hash, "Hub signup token issued");
                Ok(())
            }
            Err(e) => {
                // Without its email the token is unreachable; drop it so a
                // retry starts clean. Expiry covers us if the delete fails.
                drop(tx);
                if let Err(del) = self.directory.delete_hub_signup_token(&token_hash).await {
                    warn!(error = %del, "Failed to remove orphaned signup token");
                }
                Err(e)
            }
        }
    }

    /// Step 2: turns a signup token into a directory entry, a regional
    /// user, and a first session.
    ///
    /// ## Errors
    ///
    /// - 401 - unknown/expired/consumed token
    /// - 409 `handle` / `email` - uniqueness conflicts
    /// - 400 - `home_region` does not name this node's region (the router
    ///   routed us the request, so this only fires on skew)
    pub async fn complete_signup(
        &self,
        signup_token: &RegionToken,
        handle: &str,
        password_plain: &str,
        full_name: &str,
        preferred_language: &str,
        home_region: Region,
    ) -> Result<RegionToken, ApiError> {
        if home_region != self.region {
            return Err(ApiError::BadRequest {
                message: format!("home_region {} is not served here", home_region),
            });
        }

        let token_hash = signup_token.hash();
        let signup = self
            .directory
            .hub_signup_token(&token_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let password_hash = password::hash(password_plain)?;
        let user_id = Uuid::new_v4();

        // Global SAGA tx: directory entry + token consumption.
        self.directory
            .commit_hub_signup(user_id, handle, &signup.email_hash, home_region, &token_hash)
            .await?;

        // Regional tx: user row + first session.
        let (session, session_hash) = RegionToken::issue(self.region);
        let regional = async {
            let mut tx = self.repo.begin().await?;
            self.repo
                .insert_user(
                    &mut tx,
                    user_id,
                    &signup.email,
                    &password_hash,
                    full_name,
                    preferred_language,
                )
                .await?;
            self.repo
                .insert_session(&mut tx, &session_hash, user_id, false, expiry(self.ttls.session))
                .await?;
            tx.commit().await?;
            Ok::<(), ApiError>(())
        }
        .await;

        if let Err(e) = regional {
            // Compensation: undo the directory entry and free the token.
            if let Err(comp) = self
                .directory
                .compensate_hub_signup(user_id, &token_hash)
                .await
            {
                consistency_alert(user_id, "delete hub directory entry", &comp);
            }
            return Err(e);
        }

        info!(user_id = %user_id, region = %self.region, "Hub signup completed");
        Ok(session)
    }

    // =========================================================================
    // LOGIN / TFA
    // =========================================================================

    /// Password check plus TFA challenge. The directory was already
    /// consulted for routing; the regional store is authoritative here.
    pub async fn login(&self, email: &str, password_plain: &str) -> Result<RegionToken, ApiError> {
        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or_else(|| {
                // Same error as a wrong password; no enumeration.
                warn!("Login attempt for unknown hub account");
                ApiError::Unauthorized
            })?;

        if user.status != UserStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        if !password::verify(password_plain, &user.password_hash) {
            warn!(user_id = %user.user_id, "Failed hub login attempt");
            return Err(ApiError::Unauthorized);
        }

        let (tfa_token, tfa_hash) = RegionToken::issue(self.region);
        let code = token::generate_tfa_code();

        // Challenge and its email commit together.
        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_tfa(&mut tx, &tfa_hash, user.user_id, &code, expiry(self.ttls.tfa))
            .await?;
        self.emails
            .enqueue(&mut tx, messages::tfa_email(&user.email, &code))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Hub TFA challenge issued");
        Ok(tfa_token)
    }

    /// Exchanges a TFA token + code for a session.
    pub async fn verify_tfa(
        &self,
        tfa_token: &RegionToken,
        code: &str,
        remember_me: bool,
    ) -> Result<RegionToken, ApiError> {
        let mut tx = self.repo.begin().await?;

        let challenge = self
            .repo
            .tfa_for_update(&mut tx, &tfa_token.hash())
            .await?
            .ok_or(ApiError::Unauthorized)?;

        if !token::constant_time_eq(code, &challenge.code) {
            // Roll back; the challenge survives for another try within its
            // expiry window.
            return Err(ApiError::Unauthorized);
        }

        let user = self
            .repo
            .find_by_id(challenge.user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        if user.status != UserStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        let ttl = if remember_me {
            self.ttls.remember_session
        } else {
            self.ttls.session
        };

        let (session, session_hash) = RegionToken::issue(self.region);
        self.repo.delete_tfa(&mut tx, &tfa_token.hash()).await?;
        self.repo
            .insert_session(&mut tx, &session_hash, user.user_id, remember_me, expiry(ttl))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, remember_me, "Hub session created");
        Ok(session)
    }

    /// Deletes the caller's session.
    pub async fn logout(&self, session_hash: &str) -> Result<(), ApiError> {
        self.repo.delete_session(session_hash).await
    }

    // =========================================================================
    // PASSWORD LIFECYCLE
    // =========================================================================

    /// Always answers success; a live account gets a reset token + email.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ApiError> {
        let user = match self.repo.find_by_email(email).await? {
            Some(u) if u.status == UserStatus::Active => u,
            _ => {
                info!("Password reset requested for unknown or inactive hub account");
                return Ok(());
            }
        };

        let (reset_token, reset_hash) = RegionToken::issue(self.region);

        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_password_reset(
                &mut tx,
                &reset_hash,
                user.user_id,
                expiry(self.ttls.password_reset),
            )
            .await?;
        self.emails
            .enqueue(
                &mut tx,
                messages::password_reset_email(&user.email, &reset_token.to_string()),
            )
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Hub password reset token issued");
        Ok(())
    }

    /// Consumes a reset token, rewrites the credential, and ends every
    /// session.
    pub async fn complete_password_reset(
        &self,
        reset_token: &RegionToken,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let password_hash = password::hash(new_password)?;

        let mut tx = self.repo.begin().await?;
        let consumed = self
            .repo
            .consume_password_reset(&mut tx, &reset_token.hash())
            .await?
            .ok_or(ApiError::Unauthorized)?;

        self.repo
            .update_password(&mut tx, consumed.user_id, &password_hash)
            .await
            .map_err(|e| match e {
                // `update_password` guards on status = active
                ApiError::Unauthorized => ApiError::unprocessable("account not active"),
                other => other,
            })?;
        let ended = self.repo.delete_all_sessions(&mut tx, consumed.user_id).await?;
        tx.commit().await?;

        info!(user_id = %consumed.user_id, sessions_ended = ended, "Hub password reset completed");
        Ok(())
    }

    /// Authenticated password change; keeps the caller's session, ends the
    /// rest.
    pub async fn change_password(
        &self,
        user: &HubUser,
        session_hash: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        if !password::verify(current_password, &user.password_hash) {
            return Err(ApiError::Unauthorized);
        }

        let password_hash = password::hash(new_password)?;

        let mut tx = self.repo.begin().await?;
        self.repo
            .update_password(&mut tx, user.user_id, &password_hash)
            .await?;
        let ended = self
            .repo
            .delete_other_sessions(&mut tx, user.user_id, session_hash)
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, sessions_ended = ended, "Hub password changed");
        Ok(())
    }

    // =========================================================================
    // EMAIL CHANGE
    // =========================================================================

    /// Starts an email change: verification token to the new address.
    pub async fn request_email_change(
        &self,
        user: &HubUser,
        new_email: &str,
    ) -> Result<(), ApiError> {
        let new_hash = token::hash_email(new_email);

        if self.directory.hub_email_hash_in_use(&new_hash).await? {
            return Err(ApiError::conflict("email"));
        }

        let (verification, verification_hash) = RegionToken::issue(self.region);

        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_email_change(
                &mut tx,
                &verification_hash,
                user.user_id,
                new_email,
                expiry(self.ttls.email_verification),
            )
            .await?;
        self.emails
            .enqueue(
                &mut tx,
                messages::email_change_email(new_email, &verification.to_string()),
            )
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Hub email change requested");
        Ok(())
    }

    /// Completes an email change. Ordering is global-first (see module
    /// docs); the regional failure path reverts the directory hash.
    pub async fn complete_email_change(
        &self,
        verification_token: &RegionToken,
    ) -> Result<(), ApiError> {
        let token_hash = verification_token.hash();

        let pending = self
            .repo
            .email_change_token(&token_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let user = self
            .repo
            .find_by_id(pending.user_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;
        if user.status != UserStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        let old_hash = token::hash_email(&user.email);
        let new_hash = token::hash_email(&pending.new_email);

        // Global first: the only legal directory mutation.
        self.directory
            .set_hub_email_hash(user.user_id, &new_hash)
            .await?;

        // Regional second: consume, rewrite, end sessions.
        let regional = async {
            let mut tx = self.repo.begin().await?;
            let consumed = self.repo.consume_email_change(&mut tx, &token_hash).await?;
            if consumed.is_none() {
                // A concurrent completion of this same token won the race
                // and already committed the identical global state; this
                // request just loses.
                return Err(ApiError::Unauthorized);
            }
            self.repo
                .update_email(&mut tx, user.user_id, &pending.new_email)
                .await?;
            self.repo.delete_all_sessions(&mut tx, user.user_id).await?;
            tx.commit().await?;
            Ok::<(), ApiError>(())
        }
        .await;

        match regional {
            Ok(()) => {
                info!(user_id = %user.user_id, "Hub email change completed");
                Ok(())
            }
            Err(ApiError::Unauthorized) => Err(ApiError::Unauthorized),
            Err(e) => {
                if let Err(comp) = self
                    .directory
                    .set_hub_email_hash(user.user_id, &old_hash)
                    .await
                {
                    consistency_alert(user.user_id, "revert hub directory email hash", &comp);
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // PROFILE
    // =========================================================================

    /// Persists the preferred language.
    pub async fn set_language(&self, user_id: Uuid, language: &str) -> Result<(), ApiError> {
        self.repo.set_language(user_id, language).await
    }

    /// The caller's profile, with the handle read from the directory.
    pub async fn myinfo(&self, user: &HubUser) -> Result<(HubUser, String), ApiError> {
        let entry = self
            .directory
            .hub_entry_by_user(user.user_id)
            .await?
            .ok_or_else(|| {
                // A regional user without a directory entry is exactly the
                // drift CONSISTENCY_ALERT exists for; surface as 500.
                ApiError::internal("missing directory entry for regional user")
            })?;

        Ok((user.clone(), entry.handle))
    }

    pub fn region(&self) -> Region {
        self.region
    }
}
