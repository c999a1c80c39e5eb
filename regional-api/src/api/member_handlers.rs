//! # Employer / Agency Request Handlers
//!
//! One handler set serves both `/employer/*` and `/agency/*`: the scopes
//! register the same functions with a scope-level
//! `web::Data<MemberKind>`, and everything downstream is parameterized by
//! that kind (see [`crate::domain::MemberKind`]).

use actix_web::{web, HttpRequest, HttpResponse};
use shared::validation::validated;
use shared::ApiError;
use std::str::FromStr;

use crate::domain::{MemberKind, MemberRole};
use crate::service::auth::{self, authenticate_member};
use crate::AppState;

use super::dto::{
    ChangePasswordRequest, CompletePasswordResetRequest, CompleteSetupRequest,
    CompleteSignupResponse, DomainRequest, DomainStatusResponse, FilterUsersRequest,
    FilterUsersResponse, InitSignupRequest, InviteUserRequest, ListDomainsRequest,
    ListDomainsResponse, MemberCompleteSignupRequest, MemberLoginRequest, MemberMyInfoResponse,
    MemberRequestPasswordResetRequest, MemberSummary, MessageResponse, RoleRequest,
    SessionResponse, SetLanguageRequest, TfaTokenResponse, TfaVerifyRequest, UserActionRequest,
};

const CHECK_YOUR_EMAIL: &str = "If the address is valid, an email is on its way";

// =============================================================================
// SIGNUP
// =============================================================================

/// `POST /{employer,agency}/init-signup`
pub async fn init_signup(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<InitSignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let home_region = shared::Region::from_str(&body.home_region)
        .map_err(|message| ApiError::BadRequest { message })?;

    state
        .members(**kind)
        .init_signup(&body.email, home_region)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// `POST /{employer,agency}/complete-signup`
///
/// Requires the `_vetchium-verify.<domain>` TXT record to already hold the
/// emailed DNS token; fails 422 otherwise.
pub async fn complete_signup(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<MemberCompleteSignupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let signup_token = auth::parse_token(&body.signup_token)?;
    let service = state.members(**kind);
    let session = service
        .complete_signup(&signup_token, &body.password, &body.preferred_language)
        .await?;

    Ok(HttpResponse::Created().json(CompleteSignupResponse {
        region: service.region().to_string(),
        session_token: session.to_string(),
    }))
}

// =============================================================================
// LOGIN / TFA / SESSION
// =============================================================================

/// `POST /{employer,agency}/login`
pub async fn login(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<MemberLoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let tfa_token = state
        .members(**kind)
        .login(&body.email, &body.domain, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(TfaTokenResponse {
        tfa_token: tfa_token.to_string(),
    }))
}

/// `POST /{employer,agency}/tfa`
pub async fn tfa(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<TfaVerifyRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let tfa_token = auth::parse_token(&body.tfa_token)?;
    let session = state
        .members(**kind)
        .verify_tfa(&tfa_token, &body.code, body.remember_me)
        .await?;

    Ok(HttpResponse::Ok().json(SessionResponse {
        session_token: session.to_string(),
    }))
}

/// `POST /{employer,agency}/logout`
pub async fn logout(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;
    service.logout(&authed.session_hash).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Logged out")))
}

// =============================================================================
// INVITATION
// =============================================================================

/// `POST /{employer,agency}/invite-user`
///
/// Caller needs `invite_users` (or the admin flag).
pub async fn invite_user(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<InviteUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    service.invite_user(&authed.user, &body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Invitation sent")))
}

/// `POST /{employer,agency}/complete-setup`
pub async fn complete_setup(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<CompleteSetupRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let invitation_token = auth::parse_token(&body.invitation_token)?;
    state
        .members(**kind)
        .complete_setup(
            &invitation_token,
            &body.password,
            &body.full_name,
            &body.preferred_language,
        )
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Account ready. Please log in.",
    )))
}

// =============================================================================
// USER LIFECYCLE
// =============================================================================

/// `POST /{employer,agency}/disable-user`
///
/// 422 when the target is the last active superadmin.
pub async fn disable_user(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<UserActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    service.disable_user(&authed.user, body.user_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("User disabled")))
}

/// `POST /{employer,agency}/enable-user`
pub async fn enable_user(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<UserActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    service.enable_user(&authed.user, body.user_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("User enabled")))
}

// =============================================================================
// ROLES
// =============================================================================

fn parse_role(raw: &str) -> Result<MemberRole, ApiError> {
    MemberRole::from_str(raw).map_err(|message| ApiError::BadRequest { message })
}

/// `POST /{employer,agency}/assign-role`
pub async fn assign_role(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<RoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;
    let role = parse_role(&body.role)?;

    service.assign_role(&authed.user, body.user_id, role).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Role assigned")))
}

/// `POST /{employer,agency}/remove-role`
///
/// 422 when removing `superadmin` from its last active holder.
pub async fn remove_role(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<RoleRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;
    let role = parse_role(&body.role)?;

    service.remove_role(&authed.user, body.user_id, role).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Role removed")))
}

/// `POST /{employer,agency}/filter-users`
pub async fn filter_users(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<FilterUsersRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    let users = service
        .filter_users(&authed.user, &body.prefix, body.limit)
        .await?;

    Ok(HttpResponse::Ok().json(FilterUsersResponse {
        users: users.into_iter().map(MemberSummary::from).collect(),
    }))
}

// =============================================================================
// DOMAINS
// =============================================================================

/// `POST /{employer,agency}/claim-domain` - 201 with the fresh PENDING
/// record (including the TXT token to publish).
pub async fn claim_domain(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<DomainRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    let record = state
        .domains(**kind)
        .claim(&authed.user, &body.domain)
        .await?;

    Ok(HttpResponse::Created().json(DomainStatusResponse::from(record)))
}

/// `POST /{employer,agency}/verify-domain` - runs one TXT check, subject
/// to the per-domain cooldown (429 inside the window).
pub async fn verify_domain(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<DomainRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    let record = state
        .domains(**kind)
        .verify(&authed.user, &body.domain)
        .await?;

    Ok(HttpResponse::Ok().json(DomainStatusResponse::from(record)))
}

/// `POST /{employer,agency}/list-domains` - cursor-paged by domain name.
pub async fn list_domains(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<ListDomainsRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    let records = state
        .domains(**kind)
        .list(&authed.user, body.cursor.as_deref(), body.limit)
        .await?;

    let next_cursor = if records.len() as i64 == body.limit {
        records.last().map(|r| r.domain.clone())
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(ListDomainsResponse {
        domains: records.into_iter().map(DomainStatusResponse::from).collect(),
        next_cursor,
    }))
}

/// `POST /{employer,agency}/get-domain-status`
pub async fn get_domain_status(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<DomainRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    let record = state
        .domains(**kind)
        .get_status(&authed.user, &body.domain)
        .await?;

    Ok(HttpResponse::Ok().json(DomainStatusResponse::from(record)))
}

// =============================================================================
// PASSWORD LIFECYCLE
// =============================================================================

/// `POST /{employer,agency}/request-password-reset` - always generic 200.
pub async fn request_password_reset(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<MemberRequestPasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    state
        .members(**kind)
        .request_password_reset(&body.email, &body.domain)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(CHECK_YOUR_EMAIL)))
}

/// `POST /{employer,agency}/complete-password-reset`
pub async fn complete_password_reset(
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<CompletePasswordResetRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = validated(body.into_inner())?;

    let reset_token = auth::parse_token(&body.reset_token)?;
    state
        .members(**kind)
        .complete_password_reset(&reset_token, &body.password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password reset. Please log in with your new password.",
    )))
}

/// `POST /{employer,agency}/change-password`
pub async fn change_password(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    service
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
// PROFILE
// =============================================================================

/// `POST /{employer,agency}/set-language`
pub async fn set_language(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
    body: web::Json<SetLanguageRequest>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let body = validated(body.into_inner())?;

    service
        .set_language(authed.user.user_id, &body.preferred_language)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Language updated")))
}

/// `POST /{employer,agency}/myinfo`
pub async fn myinfo(
    req: HttpRequest,
    kind: web::Data<MemberKind>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let service = state.members(**kind);
    let authed = authenticate_member(service.repo(), &req).await?;

    let (user, org_name, roles) = service.myinfo(&authed.user).await?;

    Ok(HttpResponse::Ok().json(MemberMyInfoResponse {
        email: user.email,
        full_name: user.full_name,
        org_name,
        is_admin: user.is_admin,
        roles: roles.iter().map(|r| r.to_string()).collect(),
        preferred_language: user.preferred_language,
        region: service.region().to_string(),
    }))
}
