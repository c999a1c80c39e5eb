//! # DNS TXT Verification Lookups
//!
//! Domain ownership is proven by a TXT record at
//! `_vetchium-verify.<domain>` whose content matches the stored
//! verification token verbatim.
//!
//! The resolver sits behind a trait so the domain-verification service can
//! be tested without the network; `mockall` generates the double.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::TokioAsyncResolver;
use thiserror::Error;

/// Label prepended to the claimed domain for the verification lookup.
pub const VERIFY_LABEL: &str = "_vetchium-verify";

/// The lookup name for a claimed domain.
pub fn verification_name(domain: &str) -> String {
    format!("{}.{}", VERIFY_LABEL, domain)
}

/// Returns `true` when any answer matches the stored token verbatim.
pub fn txt_matches(records: &[String], token: &str) -> bool {
    records.iter().any(|r| r == token)
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS lookup failed: {0}")]
    Lookup(String),
}

/// TXT lookup abstraction.
///
/// A name with no TXT records (or NXDOMAIN) is `Ok(vec![])`, not an error;
/// only transport-level failures error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxtResolver: Send + Sync {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, DnsError>;
}

/// System-resolver-backed implementation.
pub struct HickoryTxtResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryTxtResolver {
    /// Builds a resolver with the default upstream configuration. Lookup
    /// caching follows the records' TTLs.
    pub fn new() -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(
                ResolverConfig::default(),
                ResolverOpts::default(),
            ),
        }
    }
}

impl Default for HickoryTxtResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, DnsError> {
        match self.resolver.txt_lookup(name.to_string()).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|txt| {
                    txt.iter()
                        .map(|data| String::from_utf8_lossy(data).into_owned())
                        .collect::<Vec<_>>()
                        .concat()
                })
                .collect()),
            Err(e) => match e.kind() {
                // Absent records are a verification failure, not an outage.
                ResolveErrorKind::NoRecordsFound { .. } => Ok(Vec::new()),
                _ => Err(DnsError::Lookup(e.to_string())),
            },
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
    fn test_verification_name() {
        assert_eq!(
            verification_name("acme.example"),
            "_vetchium-verify.acme.example"
        );
    }

    #[actix_web::test]
    async fn test_mock_resolver_drives_match_decision() {
        let mut resolver = MockTxtResolver::new();
        resolver
            .expect_txt_records()
            .withf(|name| name == "_vetchium-verify.acme.example")
            .returning(|_| Ok(vec!["expected-token".to_string()]));

        let records = resolver
            .txt_records(&verification_name("acme.example"))
            .await
            .unwrap();
        assert!(txt_matches(&records, "expected-token"));
        assert!(!txt_matches(&records, "other-token"));
    }

    #[test]
    fn test_txt_matches_verbatim_only() {
        let token = "f00dfeed".to_string();
        assert!(txt_matches(&[token.clone()], "f00dfeed"));
        // Other records alongside the right one are fine
        assert!(txt_matches(
            &["v=spf1 -all".to_string(), token],
            "f00dfeed"
        ));
        // Substring or case variants do not count
        assert!(!txt_matches(&["xf00dfeedx".to_string()], "f00dfeed"));
        assert!(!txt_matches(&["F00DFEED".to_string()], "f00dfeed"));
        assert!(!txt_matches(&[], "f00dfeed"));
    }
}
