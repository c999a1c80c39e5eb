//! DTOs for the `/admin/*` surface. Same conventions as the regional API:
//! snake_case wire form, `validator` derives, tokens parsed by the service
//! so shape failures are opaque 401s.

use serde::{Deserialize, Serialize};
use shared::validation::validators;
use validator::Validate;

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

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub global_store: String,
    pub timestamp: String,
}

// =============================================================================
// LOGIN / TFA
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminLoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TfaTokenResponse {
    pub tfa_token: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminTfaVerifyRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub tfa_token: String,

    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_token: String,
}

// =============================================================================
// INVITATION
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InviteAdminRequest {
    #[validate(email(message = "Invalid email format"))]
    #[validate(length(max = 255, message = "Email too long"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminCompleteSetupRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub invitation_token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub full_name: String,
}

// =============================================================================
// PASSWORD LIFECYCLE
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminRequestPasswordResetRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdminCompletePasswordResetRequest {
    #[validate(custom(function = "validators::not_blank"))]
    pub reset_token: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    #[validate(custom(function = "validators::strong_password"))]
    pub password: String,
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AdminMyInfoResponse {
    pub email: String,
    pub full_name: String,
}
