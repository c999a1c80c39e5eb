//! # Outbound Email Content
//!
//! Builders for every message the regional node enqueues. Bodies are
//! deliberately plain: a short text part plus a minimal HTML alternative.
//! Secrets (tokens, codes) appear only in the message content, never in
//! logs.

use shared::email::{EmailKind, NewEmail};

/// TFA sign-in code.
pub fn tfa_email(to: &str, code: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::Tfa,
        to_address: to.to_string(),
        subject: "Your Vetchium sign-in code".to_string(),
        text_body: format!(
            "Your sign-in code is {}.\n\nIt expires shortly. If you did not try to \
             sign in, you can ignore this message.",
            code
        ),
        html_body: Some(format!(
            "<p>Your sign-in code is <strong>{}</strong>.</p>\
             <p>It expires shortly. If you did not try to sign in, you can ignore \
             this message.</p>",
            code
        )),
    }
}

/// Hub signup verification, carrying the signup token.
pub fn hub_signup_email(to: &str, signup_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::SignupVerification,
        to_address: to.to_string(),
        subject: "Finish creating your Vetchium account".to_string(),
        text_body: format!(
            "Welcome to Vetchium!\n\nUse this signup token to finish creating your \
             account:\n\n{}\n\nThe token expires in 24 hours.",
            signup_token
        ),
        html_body: Some(format!(
            "<p>Welcome to Vetchium!</p>\
             <p>Use this signup token to finish creating your account:</p>\
             <p><code>{}</code></p>\
             <p>The token expires in 24 hours.</p>",
            signup_token
        )),
    }
}

/// Employer/agency signup: the signup token plus DNS TXT instructions.
pub fn org_signup_email(to: &str, signup_token: &str, domain: &str, dns_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::OrgSignupVerification,
        to_address: to.to_string(),
        subject: format!("Verify {} for Vetchium", domain),
        text_body: format!(
            "To register {domain} on Vetchium:\n\n\
             1. Add a DNS TXT record at _vetchium-verify.{domain} with this \
             value:\n\n   {dns}\n\n\
             2. Complete signup with this token:\n\n   {token}\n\n\
             Both expire in 24 hours.",
            domain = domain,
            dns = dns_token,
            token = signup_token
        ),
        html_body: Some(format!(
            "<p>To register <strong>{domain}</strong> on Vetchium:</p>\
             <ol>\
             <li>Add a DNS TXT record at <code>_vetchium-verify.{domain}</code> \
             with this value:<br><code>{dns}</code></li>\
             <li>Complete signup with this token:<br><code>{token}</code></li>\
             </ol>\
             <p>Both expire in 24 hours.</p>",
            domain = domain,
            dns = dns_token,
            token = signup_token
        )),
    }
}

/// Invitation to join an employer/agency.
pub fn invitation_email(
    to: &str,
    org_name: &str,
    inviter_name: &str,
    invitation_token: &str,
) -> NewEmail {
    NewEmail {
        kind: EmailKind::Invitation,
        to_address: to.to_string(),
        subject: format!("{} invited you to {} on Vetchium", inviter_name, org_name),
        text_body: format!(
            "{inviter} invited you to join {org} on Vetchium.\n\n\
             Use this token to set up your account:\n\n{token}\n\n\
             The invitation expires in 7 days.",
            inviter = inviter_name,
            org = org_name,
            token = invitation_token
        ),
        html_body: Some(format!(
            "<p>{inviter} invited you to join <strong>{org}</strong> on \
             Vetchium.</p>\
             <p>Use this token to set up your account:</p>\
             <p><code>{token}</code></p>\
             <p>The invitation expires in 7 days.</p>",
            inviter = inviter_name,
            org = org_name,
            token = invitation_token
        )),
    }
}

/// Password reset link token.
pub fn password_reset_email(to: &str, reset_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::PasswordReset,
        to_address: to.to_string(),
        subject: "Reset your Vetchium password".to_string(),
        text_body: format!(
            "Use this token to reset your password:\n\n{}\n\nIt expires in one \
             hour. If you did not request a reset, you can ignore this message.",
            reset_token
        ),
        html_body: Some(format!(
            "<p>Use this token to reset your password:</p>\
             <p><code>{}</code></p>\
             <p>It expires in one hour. If you did not request a reset, you can \
             ignore this message.</p>",
            reset_token
        )),
    }
}

/// Email-change verification, sent to the **new** address.
pub fn email_change_email(to_new_address: &str, verification_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::EmailChangeVerification,
        to_address: to_new_address.to_string(),
        subject: "Confirm your new Vetchium email address".to_string(),
        text_body: format!(
            "Use this token to confirm your new email address:\n\n{}\n\nIt \
             expires in one hour. Your old address keeps working until you \
             confirm.",
            verification_token
        ),
        html_body: Some(format!(
            "<p>Use this token to confirm your new email address:</p>\
             <p><code>{}</code></p>\
             <p>It expires in one hour. Your old address keeps working until you \
             confirm.</p>",
            verification_token
        )),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tfa_email_carries_code_in_both_parts() {
        let email = tfa_email("user@example.com", "123456");
        assert_eq!(email.kind, EmailKind::Tfa);
        assert!(email.text_body.contains("123456"));
        assert!(email.html_body.unwrap().contains("123456"));
    }

    #[test]
    fn test_org_signup_email_carries_both_tokens() {
        let email = org_signup_email(
            "ceo@acme.example",
            "usa1-aabb",
            "acme.example",
            "dns-token-value",
        );
        assert!(email.text_body.contains("usa1-aabb"));
        assert!(email.text_body.contains("dns-token-value"));
        assert!(email
            .text_body
            .contains("_vetchium-verify.acme.example"));
    }

    #[test]
    fn test_invitation_email_names_org_and_inviter() {
        let email = invitation_email("new@acme.example", "Acme", "Priya S", "ind1-ccdd");
        assert!(email.subject.contains("Acme"));
        assert!(email.subject.contains("Priya S"));
        assert!(email.text_body.contains("ind1-ccdd"));
    }
}
