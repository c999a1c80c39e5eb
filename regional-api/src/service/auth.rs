//! # Session Authentication
//!
//! Resolves `Authorization: Bearer <region>-<opaque>` headers to users.
//!
//! By the time a handler runs, the region router has already ensured the
//! token's prefix names this node's region (or proxied the request away),
//! so the lookup goes straight to the local store. The prefix is still
//! untrusted: authentication is the hash lookup, nothing else.
//!
//! Status policy: a missing/expired session is an opaque 401; a live
//! session whose account is no longer `active` is a 422 (the caller's
//! credentials were fine, the account state is the problem).

use crate::domain::{HubUser, MemberUser, UserStatus};
use crate::repository::{HubRepository, MemberRepository};
use actix_web::HttpRequest;
use shared::token::RegionToken;
use shared::ApiError;

/// Extracts the Bearer token from the Authorization header.
pub fn bearer_token(req: &HttpRequest) -> Result<String, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(ApiError::Unauthorized)?
        .to_str()
        .map_err(|_| ApiError::Unauthorized)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized)?;

    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    Ok(token.to_string())
}

/// Parses a wire token, mapping every shape problem to an opaque 401.
pub fn parse_token(raw: &str) -> Result<RegionToken, ApiError> {
    raw.parse::<RegionToken>().map_err(|_| ApiError::Unauthorized)
}

/// An authenticated caller plus the hash of the session token that
/// authenticated them (change-password keeps that session alive).
pub struct AuthedHub {
    pub user: HubUser,
    pub session_hash: String,
}

/// Authenticates a hub request.
pub async fn authenticate_hub(
    repo: &HubRepository,
    req: &HttpRequest,
) -> Result<AuthedHub, ApiError> {
    let token = parse_token(&bearer_token(req)?)?;
    let session_hash = token.hash();

    let user = repo
        .session_user(&session_hash)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if user.status != UserStatus::Active {
        return Err(ApiError::unprocessable("account not active"));
    }

    Ok(AuthedHub { user, session_hash })
}

/// An authenticated org/agency caller.
pub struct AuthedMember {
    pub user: MemberUser,
    pub session_hash: String,
}

/// Authenticates an org/agency request.
pub async fn authenticate_member(
    repo: &MemberRepository,
    req: &HttpRequest,
) -> Result<AuthedMember, ApiError> {
    let token = parse_token(&bearer_token(req)?)?;
    let session_hash = token.hash();

    let user = repo
        .session_user(&session_hash)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if user.status != UserStatus::Active {
        return Err(ApiError::unprocessable("account not active"));
    }

    Ok(AuthedMember { user, session_hash })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_valid() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer ind1-abc"))
            .to_http_request();

        assert_eq!(bearer_token(&req).unwrap(), "ind1-abc");
    }

    #[test]
    fn test_bearer_token_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();

        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn test_bearer_token_empty() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();

        assert!(bearer_token(&req).is_err());
    }

    #[test]
    fn test_parse_token_maps_to_opaque_401() {
        let err = parse_token("mars1-deadbeef").unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
