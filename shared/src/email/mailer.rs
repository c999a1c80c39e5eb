//! # SMTP Mailer
//!
//! The transport half of the email pipeline: turns a [`QueuedEmail`] into a
//! MIME message and hands it to the relay.
//!
//! Messages are `multipart/alternative` (text + html) when an HTML body is
//! present, plain text otherwise. lettre handles quoted-printable transfer
//! encoding and RFC 2047 encoded-word subjects for non-ASCII content.
//!
//! The [`Mailer`] trait exists so the worker loop can be exercised without
//! a relay; `mockall` generates the test double.

use crate::config::SmtpConfig;
use crate::email::QueuedEmail;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Send-path failures. All of them count as a failed attempt and are
/// recorded verbatim in the attempt log.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Message build failed: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

// =============================================================================
// MAILER TRAIT
// =============================================================================

/// Sends one queued email.
///
/// Implementations must be safe to call concurrently; the worker sends a
/// claimed batch sequentially but the trait does not rely on that.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &QueuedEmail) -> Result<(), MailError>;
}

// =============================================================================
// SMTP IMPLEMENTATION
// =============================================================================

/// lettre-backed SMTP mailer.
///
/// With credentials configured the connection upgrades via STARTTLS and
/// authenticates (AUTH PLAIN); without credentials it speaks plain SMTP,
/// which is what the in-cluster relay used by CI accepts.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let transport = match (&config.user, &config.password) {
            (Some(user), Some(password)) => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
                    .port(config.port)
                    .credentials(Credentials::new(user.clone(), password.clone()))
                    .build()
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build(),
        };

        let from = Mailbox::new(
            Some(config.from_name.clone()),
            config.from_address.parse()?,
        );

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &QueuedEmail) -> Result<Message, MailError> {
        let to: Mailbox = email.to_address.parse()?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        let message = match &email.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                html.clone(),
            ))?,
            None => builder.singlepart(SinglePart::plain(email.text_body.clone()))?,
        };

        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &QueuedEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        self.transport.send(message).await?;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{EmailKind, EmailStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: None,
            password: None,
            from_address: "no-reply@vetchium.net".to_string(),
            from_name: "Vetchium".to_string(),
        }
    }

    fn queued(html: Option<&str>) -> QueuedEmail {
        QueuedEmail {
            email_id: Uuid::new_v4(),
            kind: EmailKind::Tfa,
            to_address: "user@example.com".to_string(),
            subject: "Your sign-in code".to_string(),
            text_body: "Your code is 123456".to_string(),
            html_body: html.map(String::from),
            status: EmailStatus::Pending,
            attempt_count: 0,
            last_attempt_at: None,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    #[test]
    fn test_builds_plain_message() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let message = mailer.build_message(&queued(None)).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: Your sign-in code"));
        assert!(raw.contains("123456"));
    }

    #[test]
    fn test_builds_multipart_alternative_when_html_present() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let message = mailer
            .build_message(&queued(Some("<p>Your code is <b>123456</b></p>")))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded_word() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let mut email = queued(None);
        email.subject = "Ihr Anmeldecode für Vetchium".to_string();

        let message = mailer.build_message(&email).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        // RFC 2047 encoded-word marker
        assert!(raw.contains("=?utf-8?"));
    }

    #[test]
    fn test_rejects_bad_recipient() {
        let mailer = SmtpMailer::new(&smtp_config()).unwrap();
        let mut email = queued(None);
        email.to_address = "not an address".to_string();

        assert!(mailer.build_message(&email).is_err());
    }
}
