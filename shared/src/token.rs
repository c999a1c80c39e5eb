//! # Token Service
//!
//! Every secret the platform hands to a client shares one shape:
//!
//! ```text
//! <region>-<opaque>
//!   │        └── 32 bytes of CSPRNG output, hex-encoded (64 chars)
//!   └── lowercase region label, a routing hint only
//! ```
//!
//! The prefix tells any API node which region's store can resolve the
//! token; it is **never** trusted for anything else. The authoritative
//! check is always a lookup of the opaque part's SHA-256 in the owning
//! store. Admin tokens (global tier) are the one exception: they are bare
//! opaque values, because only the Global Service resolves them and there
//! is nothing to route.
//!
//! ## Hash-at-rest
//!
//! Stores never contain the opaque value itself, only its SHA-256. Tokens
//! are 256-bit random values, so the unsalted hash is preimage-resistant
//! and the lookup column stays indexable.
//!
//! ## Constant time
//!
//! Database lookups compare hashes, which removes the secret from the
//! timing path. The one place a short secret is compared directly - the
//! 6-digit TFA code - goes through [`constant_time_eq`].

use crate::region::Region;
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;

/// Hex length of the opaque part (32 random bytes).
pub const OPAQUE_LEN: usize = 64;

// =============================================================================
// GENERATION
// =============================================================================

/// Generates a fresh opaque token value: 32 bytes of cryptographic
/// randomness, hex-encoded.
pub fn generate_opaque() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Generates a 6-digit TFA code, zero-padded.
pub fn generate_tfa_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Hashes an opaque token value for storage with SHA-256.
pub fn hash_opaque(opaque: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(opaque.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes a lowercased email address for the global directory.
///
/// Directory rows never hold raw addresses; the hash is the join key
/// between the routing tier and the regional PII tier.
pub fn hash_email(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time equality for short secrets (TFA codes).
///
/// Length mismatch returns `false` immediately; the lengths of both sides
/// are public (always 6 digits here).
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// =============================================================================
// REGION-PREFIXED TOKENS
// =============================================================================

/// A parsed `<region>-<opaque>` token.
///
/// Parsing validates shape only (known region, 64 lowercase hex chars);
/// whether the token is live is decided by the owning store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionToken {
    pub region: Region,
    pub opaque: String,
}

impl RegionToken {
    /// Issues a new token for `region`. Returns the token and the hash to
    /// store.
    pub fn issue(region: Region) -> (RegionToken, String) {
        let opaque = generate_opaque();
        let hash = hash_opaque(&opaque);
        (RegionToken { region, opaque }, hash)
    }

    /// The storage hash of this token's opaque part.
    pub fn hash(&self) -> String {
        hash_opaque(&self.opaque)
    }
}

impl fmt::Display for RegionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.region, self.opaque)
    }
}

/// Shape errors from token parsing. All of them surface as an opaque 401.
#[derive(Debug, PartialEq, Eq)]
pub enum TokenParseError {
    /// No `-` separator, or empty parts.
    Malformed,
    /// The prefix is not a known region label.
    UnknownRegion,
    /// The opaque part is not 64 lowercase hex chars.
    BadOpaque,
}

impl FromStr for RegionToken {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, opaque) = s.split_once('-').ok_or(TokenParseError::Malformed)?;
        if prefix.is_empty() || opaque.is_empty() {
            return Err(TokenParseError::Malformed);
        }

        let region = prefix
            .parse::<Region>()
            .map_err(|_| TokenParseError::UnknownRegion)?;

        if opaque.len() != OPAQUE_LEN
            || !opaque
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(TokenParseError::BadOpaque);
        }

        Ok(RegionToken {
            region,
            opaque: opaque.to_string(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_opaque_shape() {
        let opaque = generate_opaque();
        assert_eq!(opaque.len(), OPAQUE_LEN); // 32 bytes = 64 hex chars
        assert_ne!(opaque, generate_opaque());
    }

    #[test]
    fn test_tfa_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_tfa_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_hash_opaque_deterministic() {
        let opaque = generate_opaque();
        assert_eq!(hash_opaque(&opaque), hash_opaque(&opaque));
        assert_ne!(hash_opaque(&opaque), hash_opaque("something else"));
    }

    #[test]
    fn test_hash_email_normalizes_case_and_whitespace() {
        assert_eq!(hash_email("A@Ex.COM"), hash_email("a@ex.com"));
        assert_eq!(hash_email("  a@ex.com  "), hash_email("a@ex.com"));
        assert_ne!(hash_email("a@ex.com"), hash_email("b@ex.com"));
    }

    #[test]
    fn test_issue_and_parse_round_trip() {
        let (token, hash) = RegionToken::issue(Region::Usa1);
        let wire = token.to_string();
        assert!(wire.starts_with("usa1-"));

        let parsed: RegionToken = wire.parse().unwrap();
        assert_eq!(parsed, token);
        assert_eq!(parsed.hash(), hash);
    }

    #[test]
    fn test_parse_rejects_unknown_region() {
        let opaque = generate_opaque();
        let err = format!("mars1-{}", opaque).parse::<RegionToken>().unwrap_err();
        assert_eq!(err, TokenParseError::UnknownRegion);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            "no-separator".parse::<RegionToken>().unwrap_err(),
            TokenParseError::UnknownRegion
        );
        assert_eq!(
            "justonepart".parse::<RegionToken>().unwrap_err(),
            TokenParseError::Malformed
        );
        assert_eq!(
            "ind1-".parse::<RegionToken>().unwrap_err(),
            TokenParseError::Malformed
        );
        assert_eq!(
            "ind1-nothex".parse::<RegionToken>().unwrap_err(),
            TokenParseError::BadOpaque
        );
        // Uppercase hex is not the wire form
        let upper = generate_opaque().to_uppercase();
        assert_eq!(
            format!("ind1-{}", upper).parse::<RegionToken>().unwrap_err(),
            TokenParseError::BadOpaque
        );
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("123456", "123456"));
        assert!(!constant_time_eq("123456", "123457"));
        assert!(!constant_time_eq("123456", "12345"));
    }
}
