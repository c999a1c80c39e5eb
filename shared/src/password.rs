//! # Password Hashing
//!
//! bcrypt credential handling used by every user family (hub, org, agency,
//! admin).
//!
//! ## Why bcrypt here
//!
//! Every credential this platform stores is a bcrypt hash; `verify` is
//! constant-time over the supplied password by construction. Cost uses the
//! crate default (12), which keeps a login's CPU budget dominated by this
//! call - the intended property for a brute-force target.
//!
//! ## Failure policy
//!
//! `verify` answers `false` for *any* failure, including a malformed
//! stored hash (invited users carry an empty placeholder until setup).
//! Callers turn `false` into an opaque 401; nothing about why leaks.

use crate::errors::ApiError;

/// Hashes a password for storage.
pub fn hash(password: &str) -> Result<String, ApiError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::internal(format!("bcrypt hash failed: {}", e)))
}

/// Verifies a password against a stored hash. Any error is `false`.
pub fn verify(password: &str, stored_hash: &str) -> bool {
    bcrypt::verify(password, stored_hash).unwrap_or(false)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hashed = hash("Password123$").unwrap();
        assert!(verify("Password123$", &hashed));
        assert!(!verify("Password123!", &hashed));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash("Password123$").unwrap();
        let b = hash("Password123$").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_stored_hash_is_just_false() {
        assert!(!verify("anything", ""));
        assert!(!verify("anything", "not-a-bcrypt-hash"));
    }
}
