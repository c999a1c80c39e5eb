//! # Request Validation Helpers
//!
//! Utilities for validating incoming request data using the `validator`
//! crate.
//!
//! ## Overview
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`validated`] | Consume a DTO, hand it back only if valid |
//! | [`validators`] | Custom validation functions |
//! | [`SUPPORTED_LANGUAGES`] | Closed set of preferred-language tags |
//!
//! ## How Validation Works
//!
//! Request DTOs derive `Validate`. Handlers pass the extracted body
//! through [`validated`] and work with the returned value - the function
//! consumes its input, so there is no window where a handler can touch a
//! body that failed validation:
//!
//! ```rust,ignore
//! pub async fn login(body: web::Json<HubLoginRequest>) -> Result<HttpResponse, ApiError> {
//!     let body = validated(body.into_inner())?;
//!     // every field of `body` has passed its rules
//! }
//! ```
//!
//! Failures surface as a `400` with a field-level error array (see
//! [`crate::errors`]).

use crate::errors::ApiError;
use validator::Validate;

/// Preferred-language tags the platform can serve. Returned by the global
/// catalog endpoint and accepted by `set-language`.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "de", "hi"];

// =============================================================================
// Core Validation
// =============================================================================

/// Consumes a request DTO and returns it only if every rule passes.
///
/// ## Errors
///
/// `ApiError::ValidationError` with field-level details otherwise; the
/// rejected value is dropped.
pub fn validated<T: Validate>(body: T) -> Result<T, ApiError> {
    match body.validate() {
        Ok(()) => Ok(body),
        Err(errors) => Err(ApiError::ValidationError(errors)),
    }
}

// =============================================================================
// Custom Validators
// =============================================================================

/// Custom validation functions for use with `#[validate(custom)]`.
///
/// These functions follow the validator crate's signature:
/// `fn(&T) -> Result<(), ValidationError>`
pub mod validators {
    use validator::ValidationError;

    /// Rejects strings with no visible content. Token and name fields use
    /// this so a quoted run of spaces cannot pass a presence check.
    pub fn not_blank(value: &str) -> Result<(), ValidationError> {
        match value.chars().find(|c| !c.is_whitespace()) {
            Some(_) => Ok(()),
            None => Err(ValidationError::new("blank")),
        }
    }

    /// Validates a hub handle.
    ///
    /// ## Rules
    ///
    /// - 3 to 32 characters
    /// - Only lowercase letters, digits, and hyphens
    /// - Cannot start or end with hyphen
    /// - No consecutive hyphens
    ///
    /// ## Valid Examples
    ///
    /// - `"a1"` ✗ (too short)
    /// - `"priya-s"` ✓
    /// - `"dev-2024"` ✓
    pub fn valid_handle(value: &str) -> Result<(), ValidationError> {
        if value.len() < 3 || value.len() > 32 {
            return Err(ValidationError::new("invalid_handle"));
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ValidationError::new("invalid_handle"));
        }

        // Cannot start or end with hyphen
        if value.starts_with('-') || value.ends_with('-') {
            return Err(ValidationError::new("invalid_handle"));
        }

        // No consecutive hyphens
        if value.contains("--") {
            return Err(ValidationError::new("invalid_handle"));
        }

        Ok(())
    }

    /// Validates a fully-qualified domain name (the claimable shape, not
    /// the full RFC grammar).
    ///
    /// ## Rules
    ///
    /// - At least two dot-separated labels
    /// - Labels are ASCII alphanumeric or hyphen, 1-63 chars
    /// - Labels cannot start or end with hyphen
    /// - Total length at most 253
    pub fn valid_domain(value: &str) -> Result<(), ValidationError> {
        if value.is_empty() || value.len() > 253 {
            return Err(ValidationError::new("invalid_domain"));
        }

        let labels: Vec<&str> = value.split('.').collect();
        if labels.len() < 2 {
            return Err(ValidationError::new("invalid_domain"));
        }

        for label in labels {
            if label.is_empty() || label.len() > 63 {
                return Err(ValidationError::new("invalid_domain"));
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
            {
                return Err(ValidationError::new("invalid_domain"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(ValidationError::new("invalid_domain"));
            }
        }

        Ok(())
    }

    /// Validates password strength beyond bare length: at least one
    /// letter and one digit.
    pub fn strong_password(value: &str) -> Result<(), ValidationError> {
        let has_letter = value.chars().any(|c| c.is_ascii_alphabetic());
        let has_digit = value.chars().any(|c| c.is_ascii_digit());

        if !has_letter || !has_digit {
            return Err(ValidationError::new("weak_password"));
        }
        Ok(())
    }

    /// Validates a preferred-language tag against the platform catalog.
    pub fn supported_language(value: &str) -> Result<(), ValidationError> {
        if !super::SUPPORTED_LANGUAGES.contains(&value) {
            return Err(ValidationError::new("unsupported_language"));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::validators::*;
    use super::*;

    #[derive(Validate)]
    struct Probe {
        #[validate(custom(function = "not_blank"))]
        token: String,
    }

    #[test]
    fn test_validated_hands_back_a_passing_body() {
        let probe = Probe {
            token: "usa1-aa".to_string(),
        };
        let probe = validated(probe).unwrap();
        assert_eq!(probe.token, "usa1-aa");
    }

    #[test]
    fn test_validated_rejects_and_drops_a_failing_body() {
        let probe = Probe {
            token: "   ".to_string(),
        };
        assert!(matches!(
            validated(probe),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("hello").is_ok());
        assert!(not_blank("  hello  ").is_ok());
        assert!(not_blank("").is_err());
        assert!(not_blank("   ").is_err());
        assert!(not_blank("\t\n").is_err());
    }

    #[test]
    fn test_valid_handle_accepts_reasonable_handles() {
        assert!(valid_handle("priya-s").is_ok());
        assert!(valid_handle("dev-2024").is_ok());
        assert!(valid_handle("abc").is_ok());
    }

    #[test]
    fn test_valid_handle_length_bounds() {
        assert!(valid_handle("ab").is_err());
        assert!(valid_handle(&"a".repeat(33)).is_err());
        assert!(valid_handle(&"a".repeat(32)).is_ok());
    }

    #[test]
    fn test_valid_handle_rejects_bad_shapes() {
        assert!(valid_handle("Priya").is_err()); // uppercase
        assert!(valid_handle("-priya").is_err());
        assert!(valid_handle("priya-").is_err());
        assert!(valid_handle("pri--ya").is_err());
        assert!(valid_handle("pri_ya").is_err());
        assert!(valid_handle("pri ya").is_err());
    }

    #[test]
    fn test_valid_domain_accepts_fqdns() {
        assert!(valid_domain("acme.example").is_ok());
        assert!(valid_domain("mail.acme.example").is_ok());
        assert!(valid_domain("x-y.example.com").is_ok());
    }

    #[test]
    fn test_valid_domain_rejects_bare_and_malformed() {
        assert!(valid_domain("localhost").is_err()); // single label
        assert!(valid_domain("").is_err());
        assert!(valid_domain(".example").is_err());
        assert!(valid_domain("acme.").is_err());
        assert!(valid_domain("-acme.example").is_err());
        assert!(valid_domain("acme-.example").is_err());
        assert!(valid_domain("ac me.example").is_err());
        assert!(valid_domain(&format!("{}.example", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_strong_password() {
        assert!(strong_password("Password123").is_ok());
        assert!(strong_password("password").is_err()); // no digit
        assert!(strong_password("12345678").is_err()); // no letter
    }

    #[test]
    fn test_supported_language() {
        assert!(supported_language("en").is_ok());
        assert!(supported_language("de").is_ok());
        assert!(supported_language("fr").is_err());
        assert!(supported_language("EN").is_err());
    }
}
