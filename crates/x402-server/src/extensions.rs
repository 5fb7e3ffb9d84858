//! Server-side extensions.
//!
//! A server extension is identified by a key and may enrich responses at up
//! to four phases: when a route's declarative extension data is materialized
//! for a request, when a 402 body is built, after verification, and after
//! settlement. An enricher returns the new value for `extensions[key]` only;
//! the base response is never handed out mutably, so the purity contract
//! holds by construction. Enrichment is best-effort: errors are logged and
//! swallowed in registration order.

use serde_json::Value;

use x402_types::extensions::ExtensionError;
use x402_types::proto::{self, PaymentRequirements, SettleResponse, VerifyResponse, v2};

/// Context for [`ServerExtension::enrich_payment_required_response`].
pub struct PaymentRequiredContext<'a> {
    pub response: &'a v2::PaymentRequired,
    pub requirements: &'a [PaymentRequirements],
}

/// Context for [`ServerExtension::enrich_verification_response`].
pub struct VerificationContext<'a> {
    pub payload: &'a proto::PaymentPayload,
    pub requirements: &'a PaymentRequirements,
    pub result: &'a VerifyResponse,
}

/// Context for [`ServerExtension::enrich_settlement_response`].
pub struct SettlementContext<'a> {
    pub payload: &'a proto::PaymentPayload,
    pub requirements: &'a PaymentRequirements,
    pub result: &'a SettleResponse,
}

/// A pluggable enricher for server-side responses.
///
/// All callbacks are optional; the defaults pass declarations through
/// unchanged and add nothing to responses. Each `enrich_*_response` callback
/// returns the value to store under `extensions[key]`, or `None` to leave
/// the response untouched.
pub trait ServerExtension: Send + Sync {
    /// The unique extension key (e.g. `"bazaar"`).
    fn key(&self) -> &str;

    /// Called when a route's declaration is materialized for a request, so an
    /// extension can add computed fields. `transport_context` carries opaque
    /// transport data (e.g. serialized HTTP request metadata).
    fn enrich_declaration(
        &self,
        declaration: Value,
        transport_context: &Value,
    ) -> Result<Value, ExtensionError> {
        let _ = transport_context;
        Ok(declaration)
    }

    /// May augment the 402 body under `extensions[key]`.
    fn enrich_payment_required_response(
        &self,
        declaration: &Value,
        context: &PaymentRequiredContext<'_>,
    ) -> Result<Option<Value>, ExtensionError> {
        let _ = (declaration, context);
        Ok(None)
    }

    /// May augment the verification response under `extensions[key]`.
    fn enrich_verification_response(
        &self,
        declaration: &Value,
        context: &VerificationContext<'_>,
    ) -> Result<Option<Value>, ExtensionError> {
        let _ = (declaration, context);
        Ok(None)
    }

    /// May augment the settlement response under `extensions[key]`.
    fn enrich_settlement_response(
        &self,
        declaration: &Value,
        context: &SettlementContext<'_>,
    ) -> Result<Option<Value>, ExtensionError> {
        let _ = (declaration, context);
        Ok(None)
    }
}
