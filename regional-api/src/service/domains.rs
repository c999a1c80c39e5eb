//! # Domain Verification Service
//!
//! Claim, verify, and list additional domains for an employer/agency
//! beyond the one proven at signup.
//!
//! ## State machine
//!
//! ```text
//!        claim                      TXT match
//! (new) ───────► PENDING ───────────────────────► VERIFIED
//!                   │                                │  ▲
//!                   │ token expiry                   │  │ TXT match
//!                   ▼                                ▼  │
//!            token regenerated,          threshold consecutive
//!            still PENDING               failures → FAILING
//! ```
//!
//! Re-verification is rate-limited per domain; the cooldown gate is a
//! single atomic `UPDATE … RETURNING` in the repository, so concurrent
//! verify calls cannot double-run.

use crate::domain::{DomainVerification, MemberRole, MemberUser};
use crate::repository::{DomainRepository, GlobalDirectory, MemberRepository};
use crate::service::dns::{self, TxtResolver};
use crate::service::rbac;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use shared::config::DomainVerificationConfig;
use shared::telemetry::consistency_alert;
use shared::token;
use shared::{ApiError, Region};
use std::sync::Arc;
use tracing::{info, warn};

fn expiry(ttl: std::time::Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::seconds(ttl.as_secs() as i64)
}

/// Domain verification workflows for one member family.
#[derive(Clone)]
pub struct DomainService {
    region: Region,
    directory: GlobalDirectory,
    members: MemberRepository,
    repo: DomainRepository,
    resolver: Arc<dyn TxtResolver>,
    config: DomainVerificationConfig,
}

impl DomainService {
    pub fn new(
        region: Region,
        directory: GlobalDirectory,
        members: MemberRepository,
        repo: DomainRepository,
        resolver: Arc<dyn TxtResolver>,
        config: DomainVerificationConfig,
    ) -> Self {
        Self {
            region,
            directory,
            members,
            repo,
            resolver,
            config,
        }
    }

    async fn require_domain_role(&self, caller: &MemberUser) -> Result<(), ApiError> {
        let held = self.members.roles(caller.user_id).await?;
        rbac::require_role(caller, &held, MemberRole::ManageDomains)
    }

    // =========================================================================
    // CLAIM
    // =========================================================================

    /// Claims a new domain: global uniqueness row, then the regional
    /// verification record. A regional failure releases the global row.
    ///
    /// ## Errors
    ///
    /// 409 `domain` - owned by any entity in either family.
    pub async fn claim(
        &self,
        caller: &MemberUser,
        domain: &str,
    ) -> Result<DomainVerification, ApiError> {
        self.require_domain_role(caller).await?;

        self.directory
            .claim_domain(self.members.kind(), domain, caller.org_id, self.region)
            .await?;

        let verification_token = token::generate_opaque();
        let regional = self
            .repo
            .insert(
                domain,
                caller.org_id,
                &verification_token,
                expiry(self.config.token_ttl),
            )
            .await;

        if let Err(e) = regional {
            if let Err(comp) = self
                .directory
                .release_domain(self.members.kind(), domain, caller.org_id)
                .await
            {
                consistency_alert(caller.org_id, "release global domain row", &comp);
            }
            return Err(e);
        }

        info!(org_id = %caller.org_id, "Domain claimed");
        self.repo
            .find(domain, caller.org_id)
            .await?
            .ok_or_else(|| ApiError::internal("claimed domain row vanished"))
    }

    // =========================================================================
    // VERIFY
    // =========================================================================

    /// Runs one verification attempt, subject to the per-domain cooldown.
    ///
    /// ## Errors
    ///
    /// - 404 - domain not claimed by the caller's org
    /// - 429 - inside the cooldown window
    pub async fn verify(
        &self,
        caller: &MemberUser,
        domain: &str,
    ) -> Result<DomainVerification, ApiError> {
        self.require_domain_role(caller).await?;

        let cooldown = self.config.cooldown.as_secs() as i64;
        let mut record = match self
            .repo
            .try_begin_verification(domain, caller.org_id, cooldown)
            .await?
        {
            Some(row) => row,
            None => {
                // Distinguish "rate limited" from "never claimed".
                return match self.repo.find(domain, caller.org_id).await? {
                    Some(_) => Err(ApiError::TooManyRequests {
                        retry_after_seconds: self.config.cooldown.as_secs(),
                    }),
                    None => Err(ApiError::not_found("domain")),
                };
            }
        };

        // An expired token cannot be proven; mint a fresh one and check
        // that instead (it will match once the org updates their record).
        if record.token_expires_at <= Utc::now() {
            let fresh = token::generate_opaque();
            self.repo
                .regenerate_token(domain, caller.org_id, &fresh, expiry(self.config.token_ttl))
                .await?;
            record.verification_token = fresh;
            info!(org_id = %caller.org_id, "Domain verification token regenerated");
        }

        let lookup = self
            .resolver
            .txt_records(&dns::verification_name(domain))
            .await;

        let matched = match lookup {
            Ok(records) => dns::txt_matches(&records, &record.verification_token),
            Err(e) => {
                warn!(error = %e, "DNS lookup failed during domain verification");
                false
            }
        };

        if matched {
            self.repo.mark_verified(domain, caller.org_id).await?;
            info!(org_id = %caller.org_id, "Domain verified");
            self.repo
                .find(domain, caller.org_id)
                .await?
                .ok_or_else(|| ApiError::internal("verified domain row vanished"))
        } else {
            let updated = self
                .repo
                .record_failure(domain, caller.org_id, self.config.failing_threshold)
                .await?;
            info!(
                org_id = %caller.org_id,
                consecutive_failures = updated.consecutive_failures,
                status = ?updated.status,
                "Domain verification failed"
            );
            Ok(updated)
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Pages the org's domains; `cursor` is the last domain of the
    /// previous page.
    pub async fn list(
        &self,
        caller: &MemberUser,
        cursor: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DomainVerification>, ApiError> {
        self.require_domain_role(caller).await?;
        self.repo.list(caller.org_id, cursor, limit).await
    }

    /// A single domain's verification state.
    pub async fn get_status(
        &self,
        caller: &MemberUser,
        domain: &str,
    ) -> Result<DomainVerification, ApiError> {
        self.require_domain_role(caller).await?;
        self.repo
            .find(domain, caller.org_id)
            .await?
            .ok_or_else(|| ApiError::not_found("domain"))
    }
}
