//! # Domain Entities
//!
//! Core entities for the identity platform, split across the two storage
//! tiers:
//!
//! ```text
//! Global directory (routing only)        Regional store (PII + credentials)
//! ───────────────────────────────        ──────────────────────────────────
//! HubDirectoryEntry                      HubUser, Session, TfaChallenge
//! OrgDirectoryEntry                      MemberUser, MemberRole rows
//! MemberDirectoryEntry                   ActionToken, EmailChangeToken,
//! DomainEntry                            InvitationToken
//! HubSignupToken / OrgSignupToken        DomainVerification
//! ```
//!
//! Directory entries hold no PII beyond hashes; the stable user UUID is the
//! only reference between tiers, and it points one way (directory → region,
//! resolved by lookup, never a stored back-pointer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::Region;
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// ENUMS
// =============================================================================

/// Lifecycle status of any user account.
///
/// Transitions: `invited → active ↔ disabled → deleted` (deleted is
/// reserved; no flow produces it today).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Invitation created, setup not yet completed
    Invited,
    /// Normal, can log in
    Active,
    /// Blocked by an org admin; sessions terminated
    Disabled,
    /// Reserved
    Deleted,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserStatus::Invited => write!(f, "invited"),
            UserStatus::Active => write!(f, "active"),
            UserStatus::Disabled => write!(f, "disabled"),
            UserStatus::Deleted => write!(f, "deleted"),
        }
    }
}

/// How an account authenticates.
///
/// Only `email_password` is live; the other variants exist so password
/// APIs can be gated off per-account when SSO arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    EmailPassword,
    SsoOauth,
    SsoSaml,
    HardwareToken,
}

/// Which org family a request operates on.
///
/// Employer and agency flows are structurally identical; this enum carries
/// the table names and wire labels that differ, so one handler and one
/// repository body serves both. Hub is the third, non-symmetric family and
/// has its own types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Employer,
    Agency,
}

impl MemberKind {
    /// URL path segment and log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberKind::Employer => "employer",
            MemberKind::Agency => "agency",
        }
    }

    // Regional store tables ---------------------------------------------------

    pub fn users_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_users",
            MemberKind::Agency => "agency_users",
        }
    }

    pub fn sessions_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_sessions",
            MemberKind::Agency => "agency_sessions",
        }
    }

    pub fn tfa_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_tfa_challenges",
            MemberKind::Agency => "agency_tfa_challenges",
        }
    }

    pub fn reset_tokens_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_password_reset_tokens",
            MemberKind::Agency => "agency_password_reset_tokens",
        }
    }

    pub fn invitation_tokens_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_invitation_tokens",
            MemberKind::Agency => "agency_invitation_tokens",
        }
    }

    pub fn roles_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_user_roles",
            MemberKind::Agency => "agency_user_roles",
        }
    }

    pub fn domain_verifications_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "employer_domain_verifications",
            MemberKind::Agency => "agency_domain_verifications",
        }
    }

    // Global directory tables -------------------------------------------------

    pub fn org_directory_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "employer_directory",
            MemberKind::Agency => "agency_directory",
        }
    }

    pub fn member_directory_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "org_user_directory",
            MemberKind::Agency => "agency_user_directory",
        }
    }

    pub fn domains_table(&self) -> &'static str {
        match self {
            MemberKind::Employer => "employer_domains",
            MemberKind::Agency => "agency_domains",
        }
    }
}

/// Closed role set for org/agency users. Membership lives in the regional
/// store as `(user_id, role)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// At least one active holder must exist per org at all times
    Superadmin,
    /// May invite new users
    InviteUsers,
    /// May disable/enable users
    ManageUsers,
    /// May claim and verify domains
    ManageDomains,
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Superadmin => write!(f, "superadmin"),
            MemberRole::InviteUsers => write!(f, "invite_users"),
            MemberRole::ManageUsers => write!(f, "manage_users"),
            MemberRole::ManageDomains => write!(f, "manage_domains"),
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(MemberRole::Superadmin),
            "invite_users" => Ok(MemberRole::InviteUsers),
            "manage_users" => Ok(MemberRole::ManageUsers),
            "manage_domains" => Ok(MemberRole::ManageDomains),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Verification state of a claimed domain.
///
/// `PENDING → VERIFIED → FAILING → VERIFIED` (on a later success);
/// `PENDING` persists until the token expires, after which a new
/// verification attempt regenerates the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum DomainStatus {
    Pending,
    Verified,
    Failing,
}

// =============================================================================
// REGIONAL ENTITIES
// =============================================================================

/// A hub (job-seeker) user row in this region's store.
///
/// The handle is deliberately absent: it is a global routing attribute and
/// lives only in the directory.
#[derive(Debug, Clone, FromRow)]
pub struct HubUser {
    /// Stable global UUID, identical to the directory entry's
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub preferred_language: String,
    pub status: UserStatus,
    pub auth_kind: AuthKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An org/agency user row in this region's store.
#[derive(Debug, Clone, FromRow)]
pub struct MemberUser {
    /// Stable global UUID, identical to the member directory entry's
    pub user_id: Uuid,
    /// The employer/agency this user belongs to
    pub org_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub preferred_language: String,
    pub status: UserStatus,
    pub auth_kind: AuthKind,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending TFA challenge: token plus 6-digit code, both consumed on
/// success.
#[derive(Debug, Clone, FromRow)]
pub struct TfaChallenge {
    pub token_hash: String,
    pub user_id: Uuid,
    /// 6 decimal digits, compared in constant time
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A single-use token pointing at a user: password reset and invitation
/// tokens share this shape.
#[derive(Debug, Clone, FromRow)]
pub struct ActionToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A hub email-change token carrying the new address as payload.
#[derive(Debug, Clone, FromRow)]
pub struct EmailChangeToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub new_email: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Verification bookkeeping for one claimed domain (regional; the global
/// [`DomainEntry`] row only reserves the name).
#[derive(Debug, Clone, FromRow)]
pub struct DomainVerification {
    pub domain: String,
    pub org_id: Uuid,
    /// Expected TXT record content at `_vetchium-verify.<domain>`
    pub verification_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub status: DomainStatus,
    pub last_verified_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i32,
    pub last_verification_requested_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// DIRECTORY ENTITIES (GLOBAL)
// =============================================================================

/// Hub user routing entry. The email hash is the only field that ever
/// changes (email-change flow).
#[derive(Debug, Clone, FromRow)]
pub struct HubDirectoryEntry {
    pub user_id: Uuid,
    /// Globally unique handle
    pub handle: String,
    /// SHA-256 of the lowercase email address, globally unique
    pub email_hash: String,
    pub home_region: Region,
    pub created_at: DateTime<Utc>,
}

/// Employer/agency routing entry.
#[derive(Debug, Clone, FromRow)]
pub struct OrgDirectoryEntry {
    pub org_id: Uuid,
    pub display_name: String,
    pub home_region: Region,
    pub created_at: DateTime<Utc>,
}

/// Org/agency user routing entry. Unique per `(email_hash, org_id)` - the
/// same address may work for several employers, but once per employer.
#[derive(Debug, Clone, FromRow)]
pub struct MemberDirectoryEntry {
    pub user_id: Uuid,
    pub email_hash: String,
    pub org_id: Uuid,
    pub home_region: Region,
    pub created_at: DateTime<Utc>,
}

/// A claimed domain. At most one owner across both families at a time;
/// whether it is usable is decided by the regional verification row.
#[derive(Debug, Clone, FromRow)]
pub struct DomainEntry {
    pub domain: String,
    pub org_id: Uuid,
    pub home_region: Region,
    pub created_at: DateTime<Utc>,
}

/// Hub signup token. Global because at issue time the user has no home
/// region yet; any node must be able to resolve it.
#[derive(Debug, Clone, FromRow)]
pub struct HubSignupToken {
    pub token_hash: String,
    pub email_hash: String,
    /// The raw address, held until signup completes so the regional user
    /// row can be created without asking the user again
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Employer/agency signup token, carrying the claimed domain and the DNS
/// verification token for the `_vetchium-verify.<domain>` TXT record.
#[derive(Debug, Clone, FromRow)]
pub struct OrgSignupToken {
    pub token_hash: String,
    /// `employer` or `agency`
    pub family: String,
    pub domain: String,
    pub email_hash: String,
    pub email: String,
    /// Expected TXT record content
    pub dns_token: String,
    pub home_region: Region,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_kind_tables_are_disjoint() {
        let e = MemberKind::Employer;
        let a = MemberKind::Agency;
        assert_ne!(e.users_table(), a.users_table());
        assert_ne!(e.sessions_table(), a.sessions_table());
        assert_ne!(e.roles_table(), a.roles_table());
        assert_ne!(e.domains_table(), a.domains_table());
        assert_ne!(e.member_directory_table(), a.member_directory_table());
    }

    #[test]
    fn test_member_role_round_trip() {
        for role in [
            MemberRole::Superadmin,
            MemberRole::InviteUsers,
            MemberRole::ManageUsers,
            MemberRole::ManageDomains,
        ] {
            assert_eq!(role.to_string().parse::<MemberRole>().unwrap(), role);
        }
        assert!("owner".parse::<MemberRole>().is_err());
    }

    #[test]
    fn test_user_status_wire_form() {
        assert_eq!(UserStatus::Invited.to_string(), "invited");
        assert_eq!(UserStatus::Active.to_string(), "active");
    }
}
