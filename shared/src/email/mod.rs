//! # Durable Outbound Email
//!
//! Every email the platform sends goes through a per-store queue table with
//! at-least-once delivery semantics:
//!
//! ```text
//! handler tx ──INSERT──► email_queue (pending)
//!                            │
//!                            ▼  regional-worker / global-service jobs
//!                     claim batch (FOR UPDATE SKIP LOCKED)
//!                            │
//!                            ▼
//!                        SMTP send ──ok──► status = sent
//!                            │
//!                            └─err──► attempt row + backoff,
//!                                     status = failed after max attempts
//! ```
//!
//! Producers enqueue **inside the same transaction** as the state change the
//! email reports: a TFA challenge without its email, or an email without its
//! challenge, cannot be committed.
//!
//! Exactly one consumer runs per queue. The claim query skips locked rows,
//! but the SMTP send happens outside the claiming transaction, so two
//! consumers could double-send; singleton-ness is a deployment contract
//! (`replicas: 1`, `strategy: Recreate`).

pub mod mailer;
pub mod queue;
pub mod worker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// ENUMS
// =============================================================================

/// What kind of email a queue row carries.
///
/// Used for operator triage; delivery is identical for all kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    /// Hub signup verification link
    SignupVerification,
    /// Employer/agency signup with the DNS TXT token
    OrgSignupVerification,
    /// 6-digit TFA code
    Tfa,
    /// Org/agency user invitation
    Invitation,
    /// Password reset link
    PasswordReset,
    /// Hub email-change verification to the new address
    EmailChangeVerification,
}

impl std::fmt::Display for EmailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailKind::SignupVerification => write!(f, "signup_verification"),
            EmailKind::OrgSignupVerification => write!(f, "org_signup_verification"),
            EmailKind::Tfa => write!(f, "tfa"),
            EmailKind::Invitation => write!(f, "invitation"),
            EmailKind::PasswordReset => write!(f, "password_reset"),
            EmailKind::EmailChangeVerification => write!(f, "email_change_verification"),
        }
    }
}

/// Delivery status of a queue row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    /// Awaiting delivery (including between retries)
    Pending,
    /// Successfully handed to the SMTP relay
    Sent,
    /// Gave up after max attempts
    Failed,
}

impl Default for EmailStatus {
    fn default() -> Self {
        EmailStatus::Pending
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmailStatus::Pending => write!(f, "pending"),
            EmailStatus::Sent => write!(f, "sent"),
            EmailStatus::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A row in the outbound email queue.
///
/// # Database Mapping
///
/// Maps to the `email_queue` table (regional stores) and
/// `admin_email_queue` (global store) - identical shapes.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedEmail {
    /// Unique identifier
    pub email_id: Uuid,
    /// Kind, for operator triage
    pub kind: EmailKind,
    /// Recipient address
    pub to_address: String,
    /// Subject line (RFC 2047 encoding handled at send time)
    pub subject: String,
    /// Plain-text body
    pub text_body: String,
    /// Optional HTML alternative
    pub html_body: Option<String>,
    /// Delivery status
    pub status: EmailStatus,
    /// Number of completed delivery attempts
    pub attempt_count: i32,
    /// When the last attempt finished
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the row was enqueued
    pub created_at: DateTime<Utc>,
    /// When delivery succeeded
    pub sent_at: Option<DateTime<Utc>>,
}

/// One delivery attempt, successful or not.
#[derive(Debug, Clone, FromRow)]
pub struct EmailAttempt {
    pub attempt_id: Uuid,
    pub email_id: Uuid,
    pub attempted_at: DateTime<Utc>,
    /// `None` on success
    pub error_message: Option<String>,
}

/// Data for enqueueing a new email.
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub kind: EmailKind,
    pub to_address: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_status_default_is_pending() {
        assert_eq!(EmailStatus::default(), EmailStatus::Pending);
    }

    #[test]
    fn test_kind_display_matches_storage_form() {
        assert_eq!(EmailKind::Tfa.to_string(), "tfa");
        assert_eq!(
            EmailKind::EmailChangeVerification.to_string(),
            "email_change_verification"
        );
    }
}
