//! # Application Error Types
//!
//! Unified error handling for all Vetchium processes with automatic HTTP
//! conversion.
//!
//! ## Design Philosophy
//!
//! Handlers convert every internal failure into exactly one `ApiError`
//! variant and nothing escapes the handler. Each variant maps to a specific
//! HTTP status code, ensuring consistent API responses across all processes.
//!
//! ## Error Categories
//!
//! | Kind | Variants | Status |
//! |---|---|---|
//! | Validation | `ValidationError`, `BadRequest` | 400 |
//! | Authentication | `Unauthorized` | 401 |
//! | Authorization | `Forbidden` | 403 |
//! | Not-found | `NotFound` | 404 |
//! | Conflict (caller can fix input) | `Conflict` | 409 |
//! | Oversized replay buffer | `PayloadTooLarge` | 413 |
//! | Business-rule block (wrong state) | `UnprocessableEntity` | 422 |
//! | Rate limited | `TooManyRequests` | 429 |
//! | Transient / unexpected | `DatabaseError`, `InternalError` | 500 |
//! | Proxy | `BadGateway`, `GatewayTimeout` | 502 / 504 |
//!
//! ## HTTP Response Format
//!
//! Validation errors serialize as a field-level array:
//!
//! ```json
//! [
//!   { "field": "email", "message": "Invalid email format" }
//! ]
//! ```
//!
//! All other errors serialize to a consistent envelope:
//!
//! ```json
//! {
//!   "code": "CONFLICT",
//!   "message": "Resource already exists: handle"
//! }
//! ```
//!
//! Authentication failures are deliberately opaque: the same 401 body is
//! produced for an unknown account, a wrong password, a wrong TFA code, and
//! an expired or malformed token, so callers cannot enumerate accounts.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for handlers and services.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Main Error Enum
// =============================================================================

/// Application error type with automatic HTTP status mapping.
#[derive(Debug, Error)]
pub enum ApiError {
    // =========================================================================
    // Validation Errors (400 Bad Request)
    // =========================================================================

    /// Request body failed validation rules.
    /// Contains field-level errors from the `validator` crate.
    /// Returns 400 Bad Request with a field-level array body.
    #[error("Validation error")]
    ValidationError(#[from] ValidationErrors),

    /// Generic bad request with custom message.
    /// Use for validation that doesn't fit the validator pattern.
    /// Returns 400 Bad Request.
    #[error("Invalid input: {message}")]
    BadRequest {
        /// Human-readable description of what's wrong
        message: String,
    },

    // =========================================================================
    // Authentication (401 Unauthorized)
    // =========================================================================

    /// Credentials or token invalid: wrong password, wrong TFA code,
    /// expired/consumed/unknown token, unknown region prefix.
    /// Deliberately carries no detail.
    #[error("Unauthorized")]
    Unauthorized,

    // =========================================================================
    // Authorization (403 Forbidden)
    // =========================================================================

    /// Caller is authenticated but lacks the endpoint's declared role.
    #[error("Forbidden")]
    Forbidden,

    // =========================================================================
    // Resource Errors (404 Not Found, 409 Conflict)
    // =========================================================================

    /// Requested resource doesn't exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// Resource identifier (e.g., "user", "domain")
        resource: String,
    },

    /// Action would violate a uniqueness constraint the caller can resolve
    /// by changing input (email, handle, domain, duplicate role).
    #[error("Resource already exists: {resource}")]
    Conflict {
        /// Description of the conflict (e.g., "handle already taken")
        resource: String,
    },

    // =========================================================================
    // Replay Buffer (413 Payload Too Large)
    // =========================================================================

    /// Request body exceeded the proxy replay-buffer limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    // =========================================================================
    // Business-Rule Blocks (422 Unprocessable Entity)
    // =========================================================================

    /// The request is well-formed but the entity is in a state that forbids
    /// it: disabled account, last active superadmin, DNS not verified.
    #[error("Unprocessable: {reason}")]
    UnprocessableEntity {
        /// Short machine-friendly reason (e.g., "last superadmin")
        reason: String,
    },

    // =========================================================================
    // Rate Limiting (429 Too Many Requests)
    // =========================================================================

    /// Re-verification requested inside the per-domain cooldown window.
    #[error("Too many requests")]
    TooManyRequests {
        /// Seconds until the client can retry
        retry_after_seconds: u64,
    },

    // =========================================================================
    // Server Errors (500 Internal Server Error)
    // =========================================================================
    // Logged as errors and monitored. Details are NOT exposed to clients.

    /// PostgreSQL query failed.
    /// Wraps `sqlx::Error`. Details logged, generic message returned.
    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    /// Unspecified internal error.
    /// Use as last resort when no specific variant applies.
    #[error("Internal server error")]
    InternalError {
        /// Internal message for logging (not exposed to client)
        message: String,
    },

    // =========================================================================
    // Proxy Errors (502 Bad Gateway, 504 Gateway Timeout)
    // =========================================================================
    // Terminal: the entry node never falls back to its own store.

    /// Owning peer region was unreachable.
    #[error("Peer region unreachable")]
    BadGateway,

    /// Owning peer region did not answer within the hop timeout.
    #[error("Peer region timed out")]
    GatewayTimeout,
}

// =============================================================================
// Error Methods
// =============================================================================

impl ApiError {
    /// Returns a machine-readable error code in SCREAMING_SNAKE_CASE.
    ///
    /// These codes are stable and can be used by API clients for
    /// programmatic error handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::UnprocessableEntity { .. } => "UNPROCESSABLE_ENTITY",
            Self::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError { .. } => "INTERNAL_ERROR",
            Self::BadGateway => "BAD_GATEWAY",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// This is the source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::DatabaseError(_) | Self::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::BadGateway => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Returns `true` if this is a server-side error (5xx).
    ///
    /// Server errors are logged at ERROR level and never expose internal
    /// details to clients. Client errors (4xx) are logged at WARN level.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::InternalError { .. }
                | Self::BadGateway
                | Self::GatewayTimeout
        )
    }

    /// Shorthand for the 422 business-rule block.
    pub fn unprocessable(reason: impl Into<String>) -> Self {
        Self::UnprocessableEntity {
            reason: reason.into(),
        }
    }

    /// Shorthand for the 409 uniqueness conflict.
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Shorthand for 404.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Shorthand for 500 with an internal-only message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }
}

// =============================================================================
// Response Structures
// =============================================================================

/// One field-level validation failure.
///
/// 400 responses carry an array of these as their entire body.
#[derive(Debug, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as it appears in the request JSON
    pub field: String,
    /// Human-readable description of the failure
    pub message: String,
}

/// Standard error envelope for all non-validation errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code for programmatic handling
    pub code: String,

    /// Human-readable message (for debugging, not for user display)
    pub message: String,

    /// Additional context (retry delay for 429).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: &ApiError) -> Self {
        let details = match error {
            ApiError::TooManyRequests {
                retry_after_seconds,
            } => Some(serde_json::json!({ "retry_after_seconds": retry_after_seconds })),
            // Server errors: don't expose internal details
            _ => None,
        };

        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details,
        }
    }
}

/// Flattens `validator`'s nested error map into the wire array.
fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    for (field, kinds) in errors.field_errors() {
        for err in kinds {
            out.push(FieldError {
                field: field.to_string(),
                message: err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string()),
            });
        }
    }
    out
}

// =============================================================================
// Actix-web Integration
// =============================================================================

/// Implements Actix-web's `ResponseError` trait so handlers can return
/// `ApiError` directly. Validation errors produce the field-level array
/// body; everything else produces the standard envelope.
impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        // Delegate to our implementation
        self.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::ValidationError(errors) => {
                HttpResponse::build(self.status_code()).json(field_errors(errors))
            }
            _ => HttpResponse::build(self.status_code()).json(ErrorResponse::new(self)),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_auth_errors_are_opaque_401() {
        assert_eq!(
            ApiError::Unauthorized.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
    }

    #[test]
    fn test_role_failure_is_403() {
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_conflict_vs_unprocessable_split() {
        // 409: caller can fix by changing input
        assert_eq!(
            ApiError::conflict("handle").status_code(),
            StatusCode::CONFLICT
        );
        // 422: entity is in the wrong state
        assert_eq!(
            ApiError::unprocessable("last superadmin").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_proxy_failures() {
        assert_eq!(ApiError::BadGateway.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::GatewayTimeout.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert!(ApiError::BadGateway.is_server_error());
    }

    #[test]
    fn test_error_codes_are_screaming_snake_case() {
        assert_eq!(ApiError::Unauthorized.error_code(), "UNAUTHORIZED");
        assert_eq!(ApiError::not_found("domain").error_code(), "NOT_FOUND");
        assert_eq!(
            ApiError::TooManyRequests {
                retry_after_seconds: 60
            }
            .error_code(),
            "TOO_MANY_REQUESTS"
        );
    }

    #[test]
    fn test_validation_errors_flatten_to_field_array() {
        #[derive(Validate)]
        struct Probe {
            #[validate(email(message = "Invalid email format"))]
            email: String,
        }

        let probe = Probe {
            email: "not-an-email".to_string(),
        };
        let errors = probe.validate().unwrap_err();
        let fields = field_errors(&errors);

        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "email");
        assert_eq!(fields[0].message, "Invalid email format");
    }

    #[test]
    fn test_server_errors_are_flagged() {
        assert!(ApiError::internal("boom").is_server_error());
        assert!(!ApiError::Unauthorized.is_server_error());
        assert!(!ApiError::not_found("user").is_server_error());
    }
}
