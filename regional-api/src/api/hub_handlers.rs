//! # Hub Request Handlers
//!
//! HTTP handlers for the `/hub/*` surface. Each handler follows the same
//! pattern:
//!
//! 1. **Extract** request data using Actix extractors
//! 2. **Validate** input using the `validator` crate
//! 3. **Call** the service layer
//! 4. **Transform** and return the HTTP response
//!
//! By the time these run, the region router has already placed the request
//! on the owning node; handlers never reason about regions beyond echoing
//! their own.

use actix_web::{web, HttpRequest, HttpResponse};
use shared::validation::validated;
use shared::ApiError;
use std::str::FromStr;

use crate::service::auth::{self, authenticate_hub};
use crate::AppState;

use super::dto::{
    ChangePasswordRequest, CompleteEmailChangeRequest, CompletePasswordResetRequest,
    CompleteSignupRequest, CompleteSignupResponse, HubLoginRequest, HubMyInfoResponse,
    HubRequestPasswordResetRequest, MessageResponse, RequestEmailChangeRequest,
    RequestSignupRequest, SessionResponse, SetLanguageRequest, TfaTokenResponse,
    TfaVerifyRequest,
};

/// The body callers see wherever the outcome must not reveal whether an
/// account exists.
const CHECK_YOUR_EMAIL: &str = "If the address is valid, an email is on its way";

// =============================================================================
// SIGNUP
// =============================================================================

/// `POST /hub/request-signup`
///
/// Always 200 with a generic message; an existing account and a fresh
/// signup are indistinguishable here.
pub async fn request_signup(
    state: web::Data<AppState>,
    body: web::Json<RequestSignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state.hub.request_signup(&body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// `POST /hub/complete-signup`
///
/// 201 with the home region and a first session on success; 409 on handle
/// or email conflicts; 401 for a dead token.
pub async fn complete_signup(
    state: web::Data<AppState>,
    body: web::Json<CompleteSignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let signup_token = auth::parse_token(&body.signup_token)?;
    let home_region = shared::Region::from_str(&body.home_region)
        .map_err(|message| ApiError::BadRequest { message })?;

    let session = state
        .hub
        .complete_signup(
            &signup_token,
            &body.handle,
            &body.password,
            &body.full_name,
            &body.preferred_language,
            home_region,
        )
        .await?;

    Ok(HttpResponse::Created().json(CompleteSignupResponse {
        region: home_region.to_string(),
        session_token: session.to_string(),
    }))
}

// =============================================================================
// LOGIN / TFA
// =============================================================================

/// `POST /hub/login`
///
/// Password check; on success a TFA code goes out by email and the caller
/// gets the region-prefixed TFA token to exchange for a session.
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<HubLoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let tfa_token = state.hub.login(&body.email, &body.password).await?;

    Ok(HttpResponse::Ok().json(TfaTokenResponse {
        tfa_token: tfa_token.to_string(),
    }))
}

/// `POST /hub/tfa`
pub async fn tfa(
    state: web::Data<AppState>,
    body: web::Json<TfaVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let tfa_token = auth::parse_token(&body.tfa_token)?;
    let session = state
        .hub
        .verify_tfa(&tfa_token, &body.code, body.remember_me)
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        session_token: session.to_string(),
    }))
}

/// `POST /hub/logout`
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let authed = authenticate_hub(state.hub.repo(), &req).await?;
    state.hub.logout(&authed.session_hash).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out")))
}

// =============================================================================
// PASSWORD LIFECYCLE
// =============================================================================

/// `POST /hub/request-password-reset`
///
/// Always 200 with a generic message.
pub async fn request_password_reset(
    state: web::Data<AppState>,
    body: web::Json<HubRequestPasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state.hub.request_password_reset(&body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// `POST /hub/complete-password-reset`
pub async fn complete_password_reset(
    state: web::Data<AppState>,
    body: web::Json<CompletePasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let reset_token = auth::parse_token(&body.reset_token)?;
    state
        .hub
        .complete_password_reset(&reset_token, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password reset. Please log in with your new password.",
    )))
}

/// `POST /hub/change-password`
pub async fn change_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let authed = authenticate_hub(state.hub.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    state
        .hub
        .change_password(
            &authed.user,
            &authed.session_hash,
            &body.current_password,
            &body.new_password,
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed")))
}

// =============================================================================
// EMAIL CHANGE
// =============================================================================

/// `POST /hub/request-email-change`
pub async fn request_email_change(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<RequestEmailChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    let authed = authenticate_hub(state.hub.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    state
        .hub
        .request_email_change(&authed.user, &body.new_email)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Check the new address for a verification email",
    )))
}

/// `POST /hub/complete-email-change`
pub async fn complete_email_change(
    state: web::Data<AppState>,
    body: web::Json<CompleteEmailChangeRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let verification_token = auth::parse_token(&body.verification_token)?;
    state.hub.complete_email_change(&verification_token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Email changed. Please log in again.",
    )))
}

// =============================================================================
// PROFILE
// =============================================================================

/// `POST /hub/set-language`
pub async fn set_language(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<SetLanguageRequest>,
) -> Result<HttpResponse, ApiError> {
    let authed = authenticate_hub(state.hub.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    state
        .hub
        .set_language(authed.user.user_id, &body.preferred_language)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Language updated")))
}

/// `POST /hub/myinfo`
pub async fn myinfo(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let authed = authenticate_hub(state.hub.repo(), &req).await?;
    let (user, handle) = state.hub.myinfo(&authed.user).await?;

    Ok(HttpResponse::Ok().json(HubMyInfoResponse {
        handle,
        full_name: user.full_name,
        email: user.email,
        preferred_language: user.preferred_language,
        region: state.hub.region().to_string(),
    }))
}
