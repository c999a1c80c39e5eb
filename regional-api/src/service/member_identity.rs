//! # Org/Agency Identity Service
//!
//! The member-family state machine: DNS-verified signup, invitations, TFA
//! login, user lifecycle (`invited → active ↔ disabled`), role grants, and
//! the password lifecycle. One implementation serves employers and
//! agencies; the [`MemberKind`] inside the repository selects the tables.
//!
//! ## Admin floor
//!
//! Every org must keep at least one **active** user holding `superadmin`.
//! The guard runs inside the same transaction as the disabling or
//! role-removing write, over a `FOR UPDATE` lock of the org's superadmin
//! role rows, so two racing "disable the other admin" requests serialize
//! and the second one fails with 422.

use crate::domain::{MemberKind, MemberRole, MemberUser, UserStatus};
use crate::repository::{GlobalDirectory, MemberRepository};
use crate::service::dns::{self, TxtResolver};
use crate::service::{messages, rbac};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::config::TokenTtlConfig;
use shared::email::queue::EmailQueue;
use shared::telemetry::consistency_alert;
use shared::token::{self, RegionToken};
use shared::{password, ApiError, Region};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn expiry(ttl: std::time::Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(ttl.as_secs() as i64)
}

/// Extracts the host part of a business email address.
fn email_domain(email: &str) -> Result<String, ApiError> {
    email
        .rsplit_once('@')
        .map(|(_, host)| host.trim().to_lowercase())
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ApiError::BadRequest {
            message: "email has no domain part".to_string(),
        })
}

/// Member-family identity state machine.
#[derive(Clone)]
pub struct MemberIdentityService {
    region: Region,
    directory: GlobalDirectory,
    repo: MemberRepository,
    emails: EmailQueue,
    ttls: TokenTtlConfig,
    resolver: Arc<dyn TxtResolver>,
}

impl MemberIdentityService {
    pub fn new(
        region: Region,
        directory: GlobalDirectory,
        repo: MemberRepository,
        emails: EmailQueue,
        ttls: TokenTtlConfig,
        resolver: Arc<dyn TxtResolver>,
    ) -> Self {
        Self {
            region,
            directory,
            repo,
            emails,
            ttls,
            resolver,
        }
    }

    pub fn kind(&self) -> MemberKind {
        self.repo.kind()
    }

    pub fn repo(&self) -> &MemberRepository {
        &self.repo
    }

    // =========================================================================
    // SIGNUP (DNS-VERIFIED)
    // =========================================================================

    /// Step 1: issues a signup token bound to the business email's domain
    /// plus the DNS token to publish at `_vetchium-verify.<domain>`.
    pub async fn init_signup(&self, email: &str, home_region: Region) -> Result<(), ApiError> {
        if home_region != self.region {
            return Err(ApiError::BadRequest {
                message: format!("home_region {} is not served here", home_region),
            });
        }

        let domain = email_domain(email)?;
        let email_hash = token::hash_email(email);
        let dns_token = token::generate_opaque();

        let (signup_token, token_hash) = RegionToken::issue(self.region);
        self.directory
            .create_org_signup_token(
                &token_hash,
                self.kind(),
                &domain,
                email,
                &email_hash,
                &dns_token,
                home_region,
                expiry(self.ttls.signup),
            )
            .await?;

        let mut tx = self.repo.begin().await?;
        self.emails
            .enqueue(
                &mut tx,
                messages::org_signup_email(email, &signup_token.to_string(), &domain, &dns_token),
            )
            .await?;
        tx.commit().await?;

        info!(kind = self.kind().as_str(), "Org signup token issued");
        Ok(())
    }

    /// Step 2: checks the TXT record, then creates the org, its domain,
    /// the bootstrap superadmin, and a first session.
    ///
    /// ## Errors
    ///
    /// - 401 - unknown/expired/consumed token
    /// - 422 `DNS not verified` - the TXT record is absent or wrong (a
    ///   single failed lookup fails the call)
    /// - 409 `domain` / `email` - uniqueness conflicts
    pub async fn complete_signup(
        &self,
        signup_token: &RegionToken,
        password_plain: &str,
        preferred_language: &str,
    ) -> Result<RegionToken, ApiError> {
        let token_hash = signup_token.hash();
        let signup = self
            .directory
            .org_signup_token(self.kind(), &token_hash)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        // DNS proof. Resolver trouble is indistinguishable from a missing
        // record for the caller: both are "not verified, try again".
        let records = self
            .resolver
            .txt_records(&dns::verification_name(&signup.domain))
            .await
            .map_err(|e| {
                warn!(error = %e, "DNS lookup failed during org signup");
                ApiError::unprocessable("DNS not verified")
            })?;
        if !dns::txt_matches(&records, &signup.dns_token) {
            return Err(ApiError::unprocessable("DNS not verified"));
        }

        let password_hash = password::hash(password_plain)?;
        let org_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let full_name = signup
            .email
            .split('@')
            .next()
            .unwrap_or("admin")
            .to_string();

        // Global SAGA tx: org + domain + member entries, token consumed.
        self.directory
            .commit_org_signup(
                self.kind(),
                org_id,
                &signup.domain,
                &signup.domain,
                user_id,
                &signup.email_hash,
                self.region,
                &token_hash,
            )
            .await?;

        // Regional tx: bootstrap superadmin + session.
        let (session, session_hash) = RegionToken::issue(self.region);
        let regional = async {
            let mut tx = self.repo.begin().await?;
            self.repo
                .insert_user(
                    &mut tx,
                    user_id,
                    org_id,
                    &signup.email,
                    &password_hash,
                    &full_name,
                    preferred_language,
                    UserStatus::Active,
                    true,
                )
                .await?;
            self.repo
                .assign_role(&mut tx, user_id, MemberRole::Superadmin)
                .await?;
            self.repo
                .insert_session(&mut tx, &session_hash, user_id, false, expiry(self.ttls.session))
                .await?;
            tx.commit().await?;
            Ok::<(), ApiError>(())
        }
        .await;

        if let Err(e) = regional {
            if let Err(comp) = self
                .directory
                .compensate_org_signup(self.kind(), org_id, &signup.domain, user_id, &token_hash)
                .await
            {
                consistency_alert(org_id, "delete org directory entries", &comp);
            }
            return Err(e);
        }

        info!(
            kind = self.kind().as_str(),
            org_id = %org_id,
            user_id = %user_id,
            "Org signup completed"
        );
        Ok(session)
    }

    // =========================================================================
    // LOGIN / TFA
    // =========================================================================

    /// Password check plus TFA challenge. The `(domain, email)` pair walks
    /// the directory for the org and membership; the regional store holds
    /// the credential.
    pub async fn login(
        &self,
        email: &str,
        domain: &str,
        password_plain: &str,
    ) -> Result<RegionToken, ApiError> {
        let org = self
            .directory
            .org_by_domain(self.kind(), domain)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let email_hash = token::hash_email(email);
        self.directory
            .member_entry(self.kind(), &email_hash, org.org_id)
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let user = self
            .repo
            .find_by_email_and_org(email, org.org_id)
            .await?
            .ok_or_else(|| {
                warn!(kind = self.kind().as_str(), "Login attempt for unknown member");
                ApiError::Unauthorized
            })?;

        if user.status != UserStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        if !password::verify(password_plain, &user.password_hash) {
            warn!(user_id = %user.user_id, "Failed member login attempt");
            return Err(ApiError::Unauthorized);
        }

        let (tfa_token, tfa_hash) = RegionToken::issue(self.region);
        let code = token::generate_tfa_code();

        let mut tx = self.repo.begin().await?;
        self.repo
            .insert_tfa(&mut tx, &tfa_hash, user.user_id, &code, expiry(self.ttls.tfa))
            .await?;
        self.emails
            .enqueue(&mut tx, messages::tfa_email(&user.email, &code))
            .await?;
        tx.commit().await?;

        info!(user_id = %user.user_id, "Member TFA challenge issued");
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

        info!(user_id = %user.user_id, remember_me, "Member session created");
        Ok(session)
    }

    pub async fn logout(&self, session_hash: &str) -> Result<(), ApiError> {
        self.repo.delete_session(session_hash).await
    }

    // =========================================================================
    // INVITATION
    // =========================================================================

    /// Invites a new user into the caller's org.
    ///
    /// Directory entry first (global), then the regional user + token +
    /// email in one transaction; a regional failure compensates by
    /// deleting the directory entry.
    pub async fn invite_user(&self, inviter: &MemberUser, email: &str) -> Result<(), ApiError> {
        let held = self.repo.roles(inviter.user_id).await?;
        rbac::require_role(inviter, &held, MemberRole::InviteUsers)?;

        // Reads before any write: org display name for the email body.
        let org = self
            .directory
            .org_entry(self.kind(), inviter.org_id)
            .await?
            .ok_or_else(|| ApiError::internal("missing org directory entry"))?;

        let email_hash = token::hash_email(email);
        let user_id = Uuid::new_v4();

        // Global half. 409 when this address already belongs to the org.
        self.directory
            .create_member_entry(self.kind(), user_id, &email_hash, inviter.org_id, self.region)
            .await?;

        // Regional half: invited user + invitation token + email.
        let (invitation, invitation_hash) = RegionToken::issue(self.region);
        let regional = async {
            let mut tx = self.repo.begin().await?;
            self.repo
                .insert_user(
                    &mut tx,
                    user_id,
                    inviter.org_id,
                    email,
                    "", // no credential until setup completes
                    "",
                    &inviter.preferred_language,
                    UserStatus::Invited,
                    false,
                )
                .await?;
            self.repo
                .insert_invitation(&mut tx, &invitation_hash, user_id, expiry(self.ttls.invitation))
                .await?;
            self.emails
                .enqueue(
                    &mut tx,
                    messages::invitation_email(
                        email,
                        &org.display_name,
                        &inviter.full_name,
                        &invitation.to_string(),
                    ),
                )
                .await?;
            tx.commit().await?;
            Ok::<(), ApiError>(())
        }
        .await;

        if let Err(e) = regional {
            if let Err(comp) = self.directory.delete_member_entry(self.kind(), user_id).await {
                consistency_alert(user_id, "delete member directory entry", &comp);
            }
            return Err(e);
        }

        info!(
            kind = self.kind().as_str(),
            org_id = %inviter.org_id,
            invited_user_id = %user_id,
            "User invited"
        );
        Ok(())
    }

    /// Completes invitation setup inside one regional transaction.
    pub async fn complete_setup(
        &self,
        invitation_token: &RegionToken,
        password_plain: &str,
        full_name: &str,
        preferred_language: &str,
    ) -> Result<(), ApiError> {
        let password_hash = password::hash(password_plain)?;

        let mut tx = self.repo.begin().await?;
        let invitation = self
            .repo
            .consume_invitation(&mut tx, &invitation_token.hash())
            .await?
            .ok_or(ApiError::Unauthorized)?;

        let updated = self
            .repo
            .complete_setup(
                &mut tx,
                invitation.user_id,
                &password_hash,
                full_name,
                preferred_language,
            )
            .await?;
        if !updated {
            // Token pointed at a user that is no longer `invited`.
            return Err(ApiError::unprocessable("account not in invited state"));
        }
        tx.commit().await?;

        info!(user_id = %invitation.user_id, "Invitation setup completed");
        Ok(())
    }

    // =========================================================================
    // USER LIFECYCLE
    // =========================================================================

    /// Disables a user, guarded by the admin floor. Sessions are purged
    /// best-effort after the status commit; if that purge fails the user
    /// is disabled and their sessions die at natural expiry.
    pub async fn disable_user(
        &self,
        caller: &MemberUser,
        target_user_id: Uuid,
    ) -> Result<(), ApiError> {
        let held = self.repo.roles(caller.user_id).await?;
        rbac::require_role(caller, &held, MemberRole::ManageUsers)?;

        let target = self.target_in_org(caller, target_user_id).await?;
        if target.status != UserStatus::Active {
            return Err(ApiError::unprocessable("account not active"));
        }

        let mut tx = self.repo.begin().await?;
        let superadmins = self
            .repo
            .active_superadmins_for_update(&mut tx, caller.org_id)
            .await?;
        if superadmins.contains(&target_user_id) && superadmins.len() == 1 {
            return Err(ApiError::unprocessable("last superadmin"));
        }

        self.repo
            .set_status(&mut tx, target_user_id, UserStatus::Disabled)
            .await?;
        tx.commit().await?;

        match self.repo.delete_all_sessions_best_effort(target_user_id).await {
            Ok(n) => info!(user_id = %target_user_id, sessions_ended = n, "User disabled"),
            Err(e) => warn!(
                user_id = %target_user_id,
                error = %e,
                "User disabled but session purge failed; sessions expire naturally"
            ),
        }
        Ok(())
    }

    /// Re-enables a disabled user.
    pub async fn enable_user(
        &self,
        caller: &MemberUser,
        target_user_id: Uuid,
    ) -> Result<(), ApiError> {
        let held = self.repo.roles(caller.user_id).await?;
        rbac::require_role(caller, &held, MemberRole::ManageUsers)?;

        let target = self.target_in_org(caller, target_user_id).await?;
        if target.status != UserStatus::Disabled {
            return Err(ApiError::unprocessable("account not disabled"));
        }

        let mut tx = self.repo.begin().await?;
        self.repo
            .set_status(&mut tx, target_user_id, UserStatus::Active)
            .await?;
        tx.commit().await?;

        info!(user_id = %target_user_id, "User enabled");
        Ok(())
    }

    // =========================================================================
    // ROLES
    // =========================================================================

    /// Grants a role. Admin-only.
    pub async fn assign_role(
        &self,
        caller: &MemberUser,
        target_user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), ApiError> {
        rbac::require_admin(caller)?;
        self.target_in_org(caller, target_user_id).await?;

        let mut tx = self.repo.begin().await?;
        self.repo.assign_role(&mut tx, target_user_id, role).await?;
        tx.commit().await?;

        info!(user_id = %target_user_id, role = %role, "Role assigned");
        Ok(())
    }

    /// Revokes a role. Admin-only; removing `superadmin` runs the admin
    /// floor guard under the same transaction's locks.
    pub async fn remove_role(
        &self,
        caller: &MemberUser,
        target_user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), ApiError> {
        rbac::require_admin(caller)?;
        self.target_in_org(caller, target_user_id).await?;

        let mut tx = self.repo.begin().await?;

        if role == MemberRole::Superadmin {
            let superadmins = self
                .repo
                .active_superadmins_for_update(&mut tx, caller.org_id)
                .await?;
            if superadmins.contains(&target_user_id) && superadmins.len() == 1 {
                return Err(ApiError::unprocessable("last superadmin"));
            }
        }

        self.repo.remove_role(&mut tx, target_user_id, role).await?;
        tx.commit().await?;

        info!(user_id = %target_user_id, role = %role, "Role removed");
        Ok(())
    }

    /// The caller's target, constrained to their own org (404 otherwise -
    /// other orgs' users do not exist from here).
    async fn target_in_org(
        &self,
        caller: &MemberUser,
        target_user_id: Uuid,
    ) -> Result<MemberUser, ApiError> {
        self.repo
            .find_by_id(target_user_id)
            .await?
            .filter(|t| t.org_id == caller.org_id)
            .ok_or_else(|| ApiError::not_found("user"))
    }

    // =========================================================================
    // PASSWORD LIFECYCLE
    // =========================================================================

    pub async fn request_password_reset(&self, email: &str, domain: &str) -> Result<(), ApiError> {
        let org = match self.directory.org_by_domain(self.kind(), domain).await? {
            Some(org) => org,
            None => {
                info!("Password reset requested for unknown org domain");
                return Ok(());
            }
        };

        let user = match self.repo.find_by_email_and_org(email, org.org_id).await? {
            Some(u) if u.status == UserStatus::Active => u,
            _ => {
                info!("Password reset requested for unknown or inactive member");
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

        info!(user_id = %user.user_id, "Member password reset token issued");
        Ok(())
    }

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
                ApiError::Unauthorized => ApiError::unprocessable("account not active"),
                other => other,
            })?;
        let ended = self.repo.delete_all_sessions(&mut tx, consumed.user_id).await?;
        tx.commit().await?;

        info!(user_id = %consumed.user_id, sessions_ended = ended, "Member password reset completed");
        Ok(())
    }

    pub async fn change_password(
        &self,
        user: &MemberUser,
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

        info!(user_id = %user.user_id, sessions_ended = ended, "Member password changed");
        Ok(())
    }

    // =========================================================================
    // PROFILE / LISTING
    // =========================================================================

    pub async fn set_language(&self, user_id: Uuid, language: &str) -> Result<(), ApiError> {
        self.repo.set_language(user_id, language).await
    }

    /// The caller's profile plus their org's display name and the roles
    /// they hold.
    pub async fn myinfo(
        &self,
        user: &MemberUser,
    ) -> Result<(MemberUser, String, Vec<MemberRole>), ApiError> {
        let org = self
            .directory
            .org_entry(self.kind(), user.org_id)
            .await?
            .ok_or_else(|| ApiError::internal("missing org directory entry"))?;
        let roles = self.repo.roles(user.user_id).await?;

        Ok((user.clone(), org.display_name, roles))
    }

    /// Prefix filter over the caller's org users.
    pub async fn filter_users(
        &self,
        caller: &MemberUser,
        prefix: &str,
        limit: i64,
    ) -> Result<Vec<MemberUser>, ApiError> {
        let held = self.repo.roles(caller.user_id).await?;
        rbac::require_role(caller, &held, MemberRole::ManageUsers)?;

        self.repo.filter_users(caller.org_id, prefix, limit).await
    }

    pub fn region(&self) -> Region {
        self.region
    }
}
