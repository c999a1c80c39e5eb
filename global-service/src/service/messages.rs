//! Outbound email content for the admin tier. Queued on the global admin
//! queue and drained by this service's own jobs loop.

use shared::email::{EmailKind, NewEmail};

pub fn tfa_email(to: &str, code: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::Tfa,
        to_address: to.to_string(),
        subject: "Your Vetchium admin sign-in code".to_string(),
        text_body: format!(
            "Your admin sign-in code is {}.\n\nIt expires shortly.",
            code
        ),
        html_body: Some(format!(
            "<p>Your admin sign-in code is <strong>{}</strong>.</p>\
             <p>It expires shortly.</p>",
            code
        )),
    }
}

pub fn invitation_email(to: &str, inviter_name: &str, invitation_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::Invitation,
        to_address: to.to_string(),
        subject: "You have been invited to administer Vetchium".to_string(),
        text_body: format!(
            "{inviter} invited you to become a Vetchium administrator.\n\n\
             Use this token to set up your account:\n\n{token}\n\n\
             The invitation expires in 7 days.",
            inviter = inviter_name,
            token = invitation_token
        ),
        html_body: Some(format!(
            "<p>{inviter} invited you to become a Vetchium administrator.</p>\
             <p>Use this token to set up your account:</p>\
             <p><code>{token}</code></p>\
             <p>The invitation expires in 7 days.</p>",
            inviter = inviter_name,
            token = invitation_token
        )),
    }
}

pub fn password_reset_email(to: &str, reset_token: &str) -> NewEmail {
    NewEmail {
        kind: EmailKind::PasswordReset,
        to_address: to.to_string(),
        subject: "Reset your Vetchium admin password".to_string(),
        text_body: format!(
            "Use this token to reset your admin password:\n\n{}\n\nIt expires \
             in one hour.",
            reset_token
        ),
        html_body: Some(format!(
            "<p>Use this token to reset your admin password:</p>\
             <p><code>{}</code></p>\
             <p>It expires in one hour.</p>",
            reset_token
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_tfa_email_carries_code() {
        let email = tfa_email("root@vetchium.net", "654321");
        assert!(email.text_body.contains("654321"));
    }
}
