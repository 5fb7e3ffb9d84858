//! Shared pieces of the protocol extension system.
//!
//! Extensions enrich responses at well-defined phases without touching the
//! base message: an enricher may only add or replace the value under
//! `extensions[key]` for its own key. Enrichment is best-effort everywhere —
//! a failing enricher is logged and skipped, never allowed to defeat payment
//! processing. The concrete server-side and client-side extension traits live
//! in the `x402-server` and `x402-client` crates; this module holds what they
//! share.

/// Error raised by an extension enricher. Always caught and logged by the
/// caller; never propagated past the enrichment site.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct ExtensionError(pub String);

impl ExtensionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for ExtensionError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.to_string())
    }
}
