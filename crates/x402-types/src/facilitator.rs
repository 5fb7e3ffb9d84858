//! The facilitator client interface.
//!
//! A resource server never settles payments itself: it hands
//! `(payload, requirements)` pairs to one or more facilitators through
//! [`FacilitatorClient`]. Implementations are either remote (HTTP) or
//! in-process; the resource server treats both uniformly.

use async_trait::async_trait;
use std::sync::Arc;

use crate::proto::{PaymentPayload, PaymentRequirements, SettleResponse, SupportedResponse, VerifyResponse};

/// Errors surfaced by facilitator interactions.
///
/// Business-level outcomes (`isValid: false`, `success: false`) are carried in
/// the responses themselves; this type covers transport and operational
/// failures only.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// The network call itself failed.
    #[error("Facilitator transport error: {context}: {message}")]
    Transport {
        context: &'static str,
        message: String,
    },
    /// The facilitator answered with a non-success HTTP status.
    #[error("Unexpected facilitator HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: u16,
        body: String,
    },
    /// The facilitator's response could not be decoded.
    #[error("Failed to decode facilitator response: {context}: {message}")]
    Codec {
        context: &'static str,
        message: String,
    },
    /// No facilitator handles the requested combination.
    #[error(
        "No facilitator support for x402 version {version}, scheme `{scheme}`, network `{network}`"
    )]
    Unsupported {
        version: u8,
        scheme: String,
        network: String,
    },
    /// A before-settle hook aborted the operation.
    #[error("Payment aborted: {0}")]
    Aborted(String),
    #[error("{0}")]
    Other(String),
}

/// Client interface to a payment facilitator.
///
/// `verify` is idempotent. `settle` is expected idempotent on the facilitator
/// side, but callers do not retry it on their own. `get_supported` is called
/// once at resource-server initialization to build the facilitator directory.
#[async_trait]
pub trait FacilitatorClient: Send + Sync {
    /// Verifies a payment payload against the requirements it claims to meet.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError>;

    /// Settles a previously verified payment.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;

    /// Lists the `(version, scheme, network)` kinds this facilitator handles.
    async fn get_supported(&self) -> Result<SupportedResponse, FacilitatorError>;
}

#[async_trait]
impl<T: FacilitatorClient + ?Sized> FacilitatorClient for Arc<T> {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.as_ref().verify(payload, requirements).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.as_ref().settle(payload, requirements).await
    }

    async fn get_supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        self.as_ref().get_supported().await
    }
}
