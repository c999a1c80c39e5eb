//! # Region Discovery
//!
//! For each incoming request, decide which region owns it. First
//! applicable rule wins:
//!
//! | Request class | Region source |
//! |---|---|
//! | Authenticated | session token prefix (`Authorization` header) |
//! | TFA / reset / setup / email-change completion | token field in body |
//! | Hub login, hub reset request | directory lookup by email hash |
//! | Org/agency login, reset request | directory lookup by (email, domain) |
//! | Hub signup-complete, org init-signup | `home_region` body field |
//! | Org/agency signup-complete | global signup-token lookup |
//! | Hub signup-request, global catalog | any region (serve locally) |
//!
//! Lookup misses resolve to **serve locally**: the handler then produces
//! the correct terminal response (opaque 401, generic 200, validation
//! 400), which keeps account enumeration impossible at this layer too. A
//! token field whose region prefix is unknown is the one hard rejection
//! (401) made here.

use crate::domain::MemberKind;
use crate::repository::GlobalDirectory;
use shared::region::RegionTopology;
use shared::token::{self, RegionToken};
use shared::{ApiError, Region};

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// How a path's owning region is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Never proxied: health, global catalog, hub signup-request.
    Local,
    /// `Authorization: Bearer` session token prefix.
    SessionAuth,
    /// Region prefix of a named token field in the JSON body.
    BodyToken { field: &'static str },
    /// `home_region` field in the JSON body.
    BodyHomeRegion,
    /// Directory lookup by SHA-256 of the `email` body field.
    HubEmailLookup,
    /// Directory lookup by (`email`, `domain`) body fields.
    MemberEmailLookup,
    /// Global signup-token lookup (`signup_token` body field).
    OrgSignupTokenLookup,
}

impl RouteClass {
    /// Whether resolution must read the request body.
    pub fn needs_body(&self) -> bool {
        !matches!(self, RouteClass::Local | RouteClass::SessionAuth)
    }
}

/// Maps a request path to its discovery rule.
///
/// Unlisted paths default to `SessionAuth`: every other endpoint on this
/// node is authenticated, and an unauthenticated request to one of them
/// is served locally and 401s.
pub fn classify(path: &str) -> RouteClass {
    match path {
        "/health" => RouteClass::Local,
        p if p.starts_with("/global/") => RouteClass::Local,

        "/hub/request-signup" => RouteClass::Local,
        "/hub/complete-signup" => RouteClass::BodyHomeRegion,
        "/hub/login" | "/hub/request-password-reset" => RouteClass::HubEmailLookup,
        "/hub/tfa" => RouteClass::BodyToken { field: "tfa_token" },
        "/hub/complete-password-reset" => RouteClass::BodyToken {
            field: "reset_token",
        },
        "/hub/complete-email-change" => RouteClass::BodyToken {
            field: "verification_token",
        },

        "/employer/init-signup" | "/agency/init-signup" => RouteClass::BodyHomeRegion,
        "/employer/complete-signup" | "/agency/complete-signup" => {
            RouteClass::OrgSignupTokenLookup
        }
        "/employer/login"
        | "/agency/login"
        | "/employer/request-password-reset"
        | "/agency/request-password-reset" => RouteClass::MemberEmailLookup,
        "/employer/tfa" | "/agency/tfa" => RouteClass::BodyToken { field: "tfa_token" },
        "/employer/complete-password-reset" | "/agency/complete-password-reset" => {
            RouteClass::BodyToken {
                field: "reset_token",
            }
        }
        "/employer/complete-setup" | "/agency/complete-setup" => RouteClass::BodyToken {
            field: "invitation_token",
        },

        _ => RouteClass::SessionAuth,
    }
}

/// The member family a path operates on, if any.
pub fn member_kind_for(path: &str) -> Option<MemberKind> {
    if path.starts_with("/employer/") {
        Some(MemberKind::Employer)
    } else if path.starts_with("/agency/") {
        Some(MemberKind::Agency)
    } else {
        None
    }
}

/// A named string field from a JSON body. Parse failures are `None`; the
/// handler's deserializer produces the real 400.
pub fn body_field(body: &[u8], field: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value.get(field)?.as_str().map(String::from)
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Routing outcome for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Serve from this node's regional store.
    Local,
    /// Transparent hop to the owning region.
    Forward(Region),
    /// Unknown region prefix in a token; terminal 401.
    Unauthorized,
}

/// Shared state the router needs: who am I, who are my peers, and the
/// directory for lookups.
#[derive(Clone)]
pub struct RouterState {
    pub topology: RegionTopology,
    pub directory: GlobalDirectory,
}

impl RouterState {
    fn place(&self, region: Region) -> Decision {
        if self.topology.is_local(region) {
            // An owner node re-receiving its own region simply serves it;
            // forwarding loops are structurally impossible.
            Decision::Local
        } else {
            Decision::Forward(region)
        }
    }

    /// Applies the discovery rule. `auth_header` is the raw
    /// `Authorization` value; `body` is the buffered body for classes that
    /// need one (empty otherwise).
    pub async fn resolve(
        &self,
        class: RouteClass,
        path: &str,
        auth_header: Option<&str>,
        body: &[u8],
    ) -> Result<Decision, ApiError> {
        match class {
            RouteClass::Local => Ok(Decision::Local),

            RouteClass::SessionAuth => {
                let raw = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                    Some(t) if !t.is_empty() => t,
                    // Missing credentials: serve locally, handler 401s.
                    _ => return Ok(Decision::Local),
                };
                match raw.parse::<RegionToken>() {
                    Ok(parsed) => Ok(self.place(parsed.region)),
                    Err(_) => Ok(Decision::Unauthorized),
                }
            }

            RouteClass::BodyToken { field } => {
                let raw = match body_field(body, field) {
                    Some(v) => v,
                    // Malformed body: serve locally, handler 400s.
                    None => return Ok(Decision::Local),
                };
                match raw.parse::<RegionToken>() {
                    Ok(parsed) => Ok(self.place(parsed.region)),
                    Err(_) => Ok(Decision::Unauthorized),
                }
            }

            RouteClass::BodyHomeRegion => {
                match body_field(body, "home_region").and_then(|r| r.parse::<Region>().ok()) {
                    Some(region) => Ok(self.place(region)),
                    // Invalid region: serve locally, validation 400s.
                    None => Ok(Decision::Local),
                }
            }

            RouteClass::HubEmailLookup => {
                let email = match body_field(body, "email") {
                    Some(v) => v,
                    None => return Ok(Decision::Local),
                };
                let entry = self
                    .directory
                    .hub_entry_by_email_hash(&token::hash_email(&email))
                    .await?;
                match entry {
                    Some(entry) => Ok(self.place(entry.home_region)),
                    // Unknown account: serve locally; the handler's opaque
                    // 401 / generic 200 keeps enumeration impossible.
                    None => Ok(Decision::Local),
                }
            }

            RouteClass::MemberEmailLookup => {
                let kind = match member_kind_for(path) {
                    Some(k) => k,
                    None => return Ok(Decision::Local),
                };
                let (email, domain) =
                    match (body_field(body, "email"), body_field(body, "domain")) {
                        (Some(e), Some(d)) => (e, d),
                        _ => return Ok(Decision::Local),
                    };

                let org = match self.directory.org_by_domain(kind, &domain).await? {
                    Some(org) => org,
                    None => return Ok(Decision::Local),
                };
                let member = self
                    .directory
                    .member_entry(kind, &token::hash_email(&email), org.org_id)
                    .await?;
                match member {
                    Some(entry) => Ok(self.place(entry.home_region)),
                    None => Ok(Decision::Local),
                }
            }

            RouteClass::OrgSignupTokenLookup => {
                let raw = match body_field(body, "signup_token") {
                    Some(v) => v,
                    None => return Ok(Decision::Local),
                };
                let parsed = match raw.parse::<RegionToken>() {
                    Ok(p) => p,
                    Err(_) => return Ok(Decision::Unauthorized),
                };
                let region = self
                    .directory
                    .org_signup_token_region(&parsed.hash())
                    .await?;
                match region {
                    Some(region) => Ok(self.place(region)),
                    // Dead token: serve locally, handler 401s.
                    None => Ok(Decision::Local),
                }
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_and_health_never_proxy() {
        assert_eq!(classify("/health"), RouteClass::Local);
        assert_eq!(classify("/global/regions"), RouteClass::Local);
        assert_eq!(classify("/global/check-domain"), RouteClass::Local);
        assert_eq!(classify("/hub/request-signup"), RouteClass::Local);
    }

    #[test]
    fn test_token_routed_paths() {
        assert_eq!(
            classify("/hub/tfa"),
            RouteClass::BodyToken { field: "tfa_token" }
        );
        assert_eq!(
            classify("/agency/complete-setup"),
            RouteClass::BodyToken {
                field: "invitation_token"
            }
        );
        assert_eq!(
            classify("/employer/complete-password-reset"),
            RouteClass::BodyToken {
                field: "reset_token"
            }
        );
        assert_eq!(
            classify("/hub/complete-email-change"),
            RouteClass::BodyToken {
                field: "verification_token"
            }
        );
    }

    #[test]
    fn test_lookup_routed_paths() {
        assert_eq!(classify("/hub/login"), RouteClass::HubEmailLookup);
        assert_eq!(
            classify("/hub/request-password-reset"),
            RouteClass::HubEmailLookup
        );
        assert_eq!(classify("/employer/login"), RouteClass::MemberEmailLookup);
        assert_eq!(
            classify("/agency/complete-signup"),
            RouteClass::OrgSignupTokenLookup
        );
    }

    #[test]
    fn test_body_region_paths() {
        assert_eq!(classify("/hub/complete-signup"), RouteClass::BodyHomeRegion);
        assert_eq!(classify("/employer/init-signup"), RouteClass::BodyHomeRegion);
    }

    #[test]
    fn test_everything_else_routes_by_session() {
        assert_eq!(classify("/hub/myinfo"), RouteClass::SessionAuth);
        assert_eq!(classify("/hub/logout"), RouteClass::SessionAuth);
        assert_eq!(classify("/employer/claim-domain"), RouteClass::SessionAuth);
        assert_eq!(classify("/agency/assign-role"), RouteClass::SessionAuth);
    }

    #[test]
    fn test_needs_body() {
        assert!(!classify("/hub/myinfo").needs_body());
        assert!(!classify("/health").needs_body());
        assert!(classify("/hub/tfa").needs_body());
        assert!(classify("/employer/login").needs_body());
    }

    #[test]
    fn test_member_kind_for() {
        assert_eq!(member_kind_for("/employer/login"), Some(MemberKind::Employer));
        assert_eq!(member_kind_for("/agency/tfa"), Some(MemberKind::Agency));
        assert_eq!(member_kind_for("/hub/login"), None);
    }

    #[test]
    fn test_body_field_extraction() {
        let body = br#"{"email": "a@ex.com", "remember_me": true}"#;
        assert_eq!(body_field(body, "email"), Some("a@ex.com".to_string()));
        assert_eq!(body_field(body, "missing"), None);
        // Non-string fields don't route
        assert_eq!(body_field(body, "remember_me"), None);
        // Garbage bodies don't route
        assert_eq!(body_field(b"not json", "email"), None);
    }
}
