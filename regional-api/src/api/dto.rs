//! # Data Transfer Objects (DTOs)
//!
//! Request and response bodies for every endpoint this node serves. They
//! are the API contract:
//!
//! - **Request validation** via the `validator` crate (field-level 400s)
//! - **Deserialization / serialization** via `serde`, snake_case wire form
//!
//! Tokens always travel as full `<region>-<opaque>` strings; handlers
//! parse them with [`crate::service::auth::parse_token`] so a malformed
//! token is an opaque 401, not a 400.

use crate::domain::{DomainStatus, DomainVerification, MemberUser, UserStatus};
use serde::{Deserialize, Serialize};
use shared::validation::validators;
use uuid::Uuid;
use validator::Validate;

// =============================================================================
// LOCAL VALIDATORS
// =============================================================================

/// Custom validators specific to this API surface.
pub mod api_validators {
    use std::str::FromStr;
    use validator::ValidationError;

    /// The closed region catalog, as a body field.
    pub fn valid_region(value: &str) -> Result<(), ValidationError> {
        shared::Region::from_str(value).map(|_| ()).map_err(|_| {
            ValidationError::new("unknown_region")
        })
    }

    /// Signup acknowledgement flags must be affirmative.
    pub fn acknowledged(value: &bool) -> Result<(), ValidationError> {
        if *value {
            Ok(())
        } else {
            Err(ValidationError::new("not_acknowledged"))
        }
    }
}

// =============================================================================
// SHARED RESPONSES
// =============================================================================

/// Generic success body for endpoints with nothing to report.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health probe body. The two store fields report each tier separately
/// so the load balancer and operators can tell a routing outage from a
/// regional one.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub region: String,
    pub global_store: String,
    pub regional_store: String,
    pub timestamp: String,
}

// =============================================================================
// HUB: SIGNUP
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestSignupRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompleteSignupRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub signup_token: String,

    #[validate(custom(function = "validators::valid_handle"))]
    pub handle: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub full_name: String,

    #[validate(custom(function = "validators::supported_language"))]
    #[serde(default = "default_language")]
    pub preferred_language: String,

    #[validate(custom(function = "api_validators::valid_region"))]
    pub home_region: String,
}

fn default_language() -> String {
    "en".to_string()
}

/// 201 body for a completed signup: the home region now holding the
/// account, plus a first session.
#[derive(Debug, Serialize)]
pub struct CompleteSignupResponse {
    pub region: String,
    pub session_token: String,
}

// =============================================================================
// HUB: LOGIN / TFA / SESSION
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HubLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login succeeded; a TFA code is on its way by email.
#[derive(Debug, Serialize)]
pub struct TfaTokenResponse {
    pub tfa_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TfaVerifyRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub tfa_token: String,

    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,

    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_token: String,
}

// =============================================================================
// HUB: PASSWORD / EMAIL / PROFILE
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HubRequestPasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompletePasswordResetRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub reset_token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RequestEmailChangeRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub new_email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompleteEmailChangeRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub verification_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetLanguageRequest {
    #[validate(custom(function = "validators::supported_language"))]
    pub preferred_language: String,
}

#[derive(Debug, Serialize)]
pub struct HubMyInfoResponse {
    pub handle: String,
    pub full_name: String,
    pub email: String,
    pub preferred_language: String,
    pub region: String,
}

// =============================================================================
// MEMBER: SIGNUP
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InitSignupRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,

    #[validate(custom(function = "api_validators::valid_region"))]
    pub home_region: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberCompleteSignupRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub signup_token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,

    #[validate(custom(function = "validators::supported_language"))]
    #[serde(default = "default_language")]
    pub preferred_language: String,

    /// Caller confirms the TXT record is in place.
    #[validate(custom(function = "api_validators::acknowledged"))]
    pub dns_acknowledged: bool,

    /// Caller accepts the platform EULA.
    #[validate(custom(function = "api_validators::acknowledged"))]
    pub eula_accepted: bool,
}

// =============================================================================
// MEMBER: LOGIN / PASSWORD
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validators::valid_domain"))]
    pub domain: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberRequestPasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(custom(function = "validators::valid_domain"))]
    pub domain: String,
}

// =============================================================================
// MEMBER: INVITATION / LIFECYCLE / ROLES
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InviteUserRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CompleteSetupRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub invitation_token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub full_name: String,

    #[validate(custom(function = "validators::supported_language"))]
    #[serde(default = "default_language")]
    pub preferred_language: String,
}

/// Target selector for disable/enable.
#[derive(Debug, Clone, Deserialize)]
pub struct UserActionRequest {
    pub user_id: Uuid,
}

/// Target + role for assign/remove. The role string is parsed against the
/// closed set; unknown names are a 400.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RoleRequest {
    pub user_id: Uuid,

    #[validate(custom(function = "validators::not_blank"))]
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FilterUsersRequest {
    #[serde(default)]
    #[validate(length(max = 255))]
    pub prefix: String,

    #[serde(default = "default_filter_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

fn default_filter_limit() -> i64 {
    40
}

#[derive(Debug, Serialize)]
pub struct MemberSummary {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub status: UserStatus,
    pub is_admin: bool,
}

impl From<MemberUser> for MemberSummary {
    fn from(user: MemberUser) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email,
            full_name: user.full_name,
            status: user.status,
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FilterUsersResponse {
    pub users: Vec<MemberSummary>,
}

#[derive(Debug, Serialize)]
pub struct MemberMyInfoResponse {
    pub email: String,
    pub full_name: String,
    pub org_name: String,
    pub is_admin: bool,
    pub roles: Vec<String>,
    pub preferred_language: String,
    pub region: String,
}

// =============================================================================
// MEMBER: DOMAINS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DomainRequest {
    #[validate(custom(function = "validators::valid_domain"))]
    pub domain: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListDomainsRequest {
    /// Last domain of the previous page (exclusive).
    #[serde(default)]
    pub cursor: Option<String>,

    #[serde(default = "default_filter_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

/// One domain's verification state. The token is disclosed only while the
/// domain still needs (re)proving.
#[derive(Debug, Serialize)]
pub struct DomainStatusResponse {
    pub domain: String,
    pub status: DomainStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    pub token_expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<String>,
    pub consecutive_failures: i32,
}

impl From<DomainVerification> for DomainStatusResponse {
    fn from(record: DomainVerification) -> Self {
        let verification_token = if record.status == DomainStatus::Verified {
            None
        } else {
            Some(record.verification_token)
        };

        Self {
            domain: record.domain,
            status: record.status,
            verification_token,
            token_expires_at: record.token_expires_at.to_rfc3339(),
            last_verified_at: record.last_verified_at.map(|t| t.to_rfc3339()),
            consecutive_failures: record.consecutive_failures,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListDomainsResponse {
    pub domains: Vec<DomainStatusResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// =============================================================================
// GLOBAL CATALOG
// =============================================================================

#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    pub regions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SupportedLanguagesResponse {
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckDomainRequest {
    #[validate(custom(function = "validators::valid_domain"))]
    pub domain: String,
}

#[derive(Debug, Serialize)]
pub struct CheckDomainResponse {
    pub domain: String,
    pub available: bool,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_signup_request_validation() {
        let ok = CompleteSignupRequest {
            signup_token: "usa1-aa".to_string(),
            handle: "priya-s".to_string(),
            password: "Password123$".to_string(),
            full_name: "Priya S".to_string(),
            preferred_language: "en".to_string(),
            home_region: "usa1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_region = CompleteSignupRequest {
            home_region: "mars1".to_string(),
            ..ok.clone()
        };
        assert!(bad_region.validate().is_err());

        let bad_handle = CompleteSignupRequest {
            handle: "Priya!".to_string(),
            ..ok.clone()
        };
        assert!(bad_handle.validate().is_err());

        let weak_password = CompleteSignupRequest {
            password: "password".to_string(),
            ..ok
        };
        assert!(weak_password.validate().is_err());
    }

    #[test]
    fn test_member_signup_requires_acknowledgements() {
        let request = MemberCompleteSignupRequest {
            signup_token: "usa1-aa".to_string(),
            password: "Password123$".to_string(),
            preferred_language: "en".to_string(),
            dns_acknowledged: false,
            eula_accepted: true,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_tfa_code_must_be_six_chars() {
        let request = TfaVerifyRequest {
            tfa_token: "ind1-aa".to_string(),
            code: "12345".to_string(),
            remember_me: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_domain_token_hidden_once_verified() {
        use chrono::Utc;
        let record = DomainVerification {
            domain: "acme.example".to_string(),
            org_id: Uuid::new_v4(),
            verification_token: "secret".to_string(),
            token_expires_at: Utc::now(),
            status: DomainStatus::Verified,
            last_verified_at: Some(Utc::now()),
            consecutive_failures: 0,
            last_verification_requested_at: None,
            created_at: Utc::now(),
        };

        let dto = DomainStatusResponse::from(record);
        assert!(dto.verification_token.is_none());
        assert!(dto.last_verified_at.is_some());
    }

    #[test]
    fn test_domain_token_disclosed_while_pending() {
        use chrono::Utc;
        let record = DomainVerification {
            domain: "acme.example".to_string(),
            org_id: Uuid::new_v4(),
            verification_token: "secret".to_string(),
            token_expires_at: Utc::now(),
            status: DomainStatus::Pending,
            last_verified_at: None,
            consecutive_failures: 2,
            last_verification_requested_at: None,
            created_at: Utc::now(),
        };

        let dto = DomainStatusResponse::from(record);
        assert_eq!(dto.verification_token.as_deref(), Some("secret"));
    }
}
