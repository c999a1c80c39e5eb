//! # RBAC Evaluator
//!
//! Check policy for protected org/agency endpoints:
//!
//! 1. `is_admin` users pass every check.
//! 2. Otherwise the endpoint's declared role must be in the caller's role
//!    set.
//! 3. Role mutation itself is admin-only; removal of `superadmin` is
//!    additionally guarded by the admin-floor invariant, which runs under
//!    row locks in the same transaction as the write (see
//!    [`crate::service::member_identity`]).
//!
//! Role membership lives in the caller's regional store; the evaluator is
//! pure over data the handler already loaded.

use crate::domain::{MemberRole, MemberUser};
use shared::ApiError;

/// Permits the call when the caller is an admin or holds `needed`.
pub fn require_role(
    user: &MemberUser,
    held: &[MemberRole],
    needed: MemberRole,
) -> Result<(), ApiError> {
    if user.is_admin || held.contains(&needed) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Permits the call only for admins (role mutation endpoints).
pub fn require_admin(user: &MemberUser) -> Result<(), ApiError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuthKind, UserStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn member(is_admin: bool) -> MemberUser {
        MemberUser {
            user_id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            email: "user@acme.example".to_string(),
            password_hash: "$2b$12$hash".to_string(),
            full_name: "Test User".to_string(),
            preferred_language: "en".to_string(),
            status: UserStatus::Active,
            auth_kind: AuthKind::EmailPassword,
            is_admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_bypasses_role_check() {
        let user = member(true);
        assert!(require_role(&user, &[], MemberRole::InviteUsers).is_ok());
        assert!(require_admin(&user).is_ok());
    }

    #[test]
    fn test_held_role_permits() {
        let user = member(false);
        assert!(require_role(&user, &[MemberRole::InviteUsers], MemberRole::InviteUsers).is_ok());
    }

    #[test]
    fn test_missing_role_forbids() {
        let user = member(false);
        let err =
            require_role(&user, &[MemberRole::ManageUsers], MemberRole::InviteUsers).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[test]
    fn test_role_mutation_is_admin_only() {
        let user = member(false);
        // Even a superadmin-role holder without the admin flag cannot
        // mutate roles.
        assert!(require_admin(&user).is_err());
    }
}
