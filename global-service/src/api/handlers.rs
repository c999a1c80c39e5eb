//! # Admin Request Handlers
//!
//! Handlers for the `/admin/*` surface. The load balancer routes these
//! paths exclusively to the Global Service; there is no region router in
//! front - admin state has no region.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use shared::database::{self, StoreTier};
use shared::validation::validated;
use shared::ApiError;

use crate::AppState;

use super::dto::{
    AdminCompletePasswordResetRequest, AdminCompleteSetupRequest, AdminLoginRequest,
    AdminMyInfoResponse, AdminRequestPasswordResetRequest, AdminTfaVerifyRequest, HealthResponse,
    InviteAdminRequest, MessageResponse, SessionResponse, TfaTokenResponse,
};

const CHECK_YOUR_EMAIL: &str = "If the address is valid, an email is on its way";

/// Extracts the Bearer token from the Authorization header.
fn bearer_token(req: &HttpRequest) -> Result<String, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .ok_or(ApiError::Unauthorized)?
        .to_str()
        .map_err(|_| ApiError::Unauthorized)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;
    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }
    Ok(token.to_string())
}

// =============================================================================
// HEALTH
// =============================================================================

/// `GET /health`
///
/// Probes the global store; this process has exactly one tier to lose.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let global_ok = database::health_check(StoreTier::Global, &state.pool)
        .await
        .is_ok();

    let body = HealthResponse {
        status: if global_ok { "healthy" } else { "degraded" }.to_string(),
        service: "global-service".to_string(),
        global_store: if global_ok { "ok" } else { "unreachable" }.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };

    if global_ok {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}

// =============================================================================
// LOGIN / TFA / SESSION
// =============================================================================

/// `POST /admin/login`
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<AdminLoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let tfa_token = state.admin.login(&body.email, &body.password).await?;

    Ok(HttpResponse::Ok().json(TfaTokenResponse { tfa_token }))
}

/// `POST /admin/tfa`
pub async fn tfa(
    state: web::Data<AppState>,
    body: web::Json<AdminTfaVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let session_token = state.admin.verify_tfa(&body.tfa_token, &body.code).await?;

    Ok(HttpResponse::Ok().json(SessionResponse { session_token }))
}

/// `POST /admin/logout`
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (_, session_hash) = state.admin.authenticate(&bearer_token(&req)?).await?;
    state.admin.logout(&session_hash).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out")))
}

// =============================================================================
// INVITATION
// =============================================================================

/// `POST /admin/invite-admin`
pub async fn invite_admin(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<InviteAdminRequest>,
) -> Result<HttpResponse, ApiError> {
    let (caller, _) = state.admin.authenticate(&bearer_token(&req)?).await?;

    let body = validated(body.into_inner())?;

    state.admin.invite_admin(&caller, &body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Invitation sent")))
}

/// `POST /admin/complete-setup`
pub async fn complete_setup(
    state: web::Data<AppState>,
    body: web::Json<AdminCompleteSetupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state
        .admin
        .complete_setup(&body.invitation_token, &body.password, &body.full_name)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Account ready. Please log in.")))
}

// =============================================================================
// PASSWORD LIFECYCLE
// =============================================================================

/// `POST /admin/request-password-reset` - always generic 200.
pub async fn request_password_reset(
    state: web::Data<AppState>,
    body: web::Json<AdminRequestPasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state.admin.request_password_reset(&body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// `POST /admin/complete-password-reset`
pub async fn complete_password_reset(
    state: web::Data<AppState>,
    body: web::Json<AdminCompletePasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state
        .admin
        .complete_password_reset(&body.reset_token, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password reset. Please log in with your new password.",
    )))
}

// =============================================================================
// PROFILE
// =============================================================================

/// `POST /admin/myinfo`
pub async fn myinfo(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let (caller, _) = state.admin.authenticate(&bearer_token(&req)?).await?;

    Ok(HttpResponse::Ok().json(AdminMyInfoResponse {
        email: caller.email,
        full_name: caller.full_name,
    }))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_extraction() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer abc123"))
            .to_http_request();
        assert_eq!(bearer_token(&req).unwrap(), "abc123");

        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_err());
    }
}
