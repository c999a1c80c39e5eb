//! # Tracing and Structured Logging Configuration
//!
//! Initializes the logging system with environment-appropriate settings.
//!
//! ## Output Formats
//!
//! | Environment | Format | Purpose |
//! |-------------|--------|---------|
//! | Development | Compact, colored | Human-readable terminal output |
//! | Production | JSON, flattened fields | Log aggregation |
//!
//! ## What never gets logged
//!
//! Passwords, full tokens, full TFA codes, and full email addresses are
//! never logged by this codebase - log email hashes and user UUIDs
//! instead. Our own call sites hold that line, but dependencies do not:
//! sqlx statement logging echoes bind values (password hashes, token
//! hashes, addresses), lettre's trace output carries SMTP envelopes with
//! recipient addresses, and the DNS resolver traces the domains it looks
//! up. The [`default_directives`] baseline therefore pins those crates to
//! `warn` in **every** environment; `RUST_LOG` can re-raise them, but the
//! operator has to do that knowingly.
//!
//! ## Filter Configuration
//!
//! `RUST_LOG`, when set, replaces the baseline entirely:
//!
//! ```bash
//! # Info for most, debug for our code
//! RUST_LOG=info,regional_api=debug
//! ```
//!
//! ## Consistency alerts
//!
//! When a compensating transaction fails after a cross-tier write, the
//! system is left with known drift between the global directory and a
//! regional store. That is an operator-action event, not a retry loop:
//! [`consistency_alert`] emits a structured ERROR record carrying the
//! authoritative entity UUID and the action an operator must apply.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Dependencies whose own logging would leak the secrets this platform
/// keeps out of its logs. Held at `warn` regardless of environment.
const QUIET_CRATES: &[&str] = &["sqlx", "lettre", "hickory_resolver", "hyper", "h2"];

/// The baseline filter when `RUST_LOG` is unset: `info` in production,
/// `debug` in development, with the secret-carrying crates pinned down.
pub fn default_directives(is_production: bool) -> String {
    let level = if is_production { "info" } else { "debug" };

    let mut directives = String::from(level);
    for krate in QUIET_CRATES {
        directives.push(',');
        directives.push_str(krate);
        directives.push_str("=warn");
    }
    directives
}

// =============================================================================
// Initialization
// =============================================================================

/// Initializes the tracing/logging system.
///
/// Call **once** at the very start of the process, before anything that
/// might emit logs.
///
/// ## Parameters
///
/// - `service_name`: Name of the service (for identification in logs)
/// - `is_production`: JSON output when true, compact terminal output
///   otherwise
pub fn init_tracing(service_name: &str, is_production: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(is_production)));

    if is_production {
        // JSON with fields flattened into the root object, the shape the
        // aggregation pipeline indexes.
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        // One line per event; targets identify the module, which is
        // enough to find the call site in a workspace this size.
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true))
            .init();
    }

    tracing::info!(
        service = service_name,
        production = is_production,
        "Tracing initialized"
    );
}

// =============================================================================
// Consistency Alerts
// =============================================================================

/// Emits the operator-visible record for a failed compensation.
///
/// `entity_id` is the authoritative UUID of the stranded entity (directory
/// entry, user, domain); `intended_action` describes the inverse write an
/// operator must apply by hand (e.g. `"delete hub directory entry"`).
///
/// Never retried automatically; never surfaced to clients.
pub fn consistency_alert(entity_id: Uuid, intended_action: &str, error: &dyn std::fmt::Display) {
    tracing::error!(
        alert = "CONSISTENCY_ALERT",
        entity_id = %entity_id,
        intended_action = intended_action,
        error = %error,
        "Compensating transaction failed; global and regional stores have drifted"
    );
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_carrying_crates_are_quiet_in_every_environment() {
        for is_production in [true, false] {
            let directives = default_directives(is_production);
            assert!(directives.contains("sqlx=warn"));
            assert!(directives.contains("lettre=warn"));
            assert!(directives.contains("hickory_resolver=warn"));
        }
    }

    #[test]
    fn test_baseline_level_tracks_environment() {
        assert!(default_directives(true).starts_with("info,"));
        assert!(default_directives(false).starts_with("debug,"));
    }
}
