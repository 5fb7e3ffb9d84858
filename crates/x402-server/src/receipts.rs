//! Offer and receipt signing.
//!
//! A resource server may cryptographically commit to its offers (the 402
//! body) and acknowledge settled payments with signed receipts. The signer is
//! an opaque capability: it produces either a JWS or an EIP-712 bundle, and
//! the core never assumes an algorithm. Signed offers ride in the 402 body's
//! `extensions` map; signed receipts ride in the settlement response's
//! `extensions` map, both under [`OFFER_RECEIPTS_KEY`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use x402_types::extensions::ExtensionError;
use x402_types::proto::PaymentRequirements;

/// Extension key under which offers and receipts are attached.
pub const OFFER_RECEIPTS_KEY: &str = "offerReceipts";

/// A detached signature envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignedEnvelope {
    /// A compact JWS string.
    Jws(String),
    /// An EIP-712 bundle: typed data plus signature.
    Eip712(serde_json::Value),
}

/// An opaque signing capability for offers and receipts.
#[async_trait]
pub trait OfferReceiptSigner: Send + Sync {
    /// Signs the set of payment requirements offered for a resource.
    async fn sign_offer(
        &self,
        url: &str,
        requirements: &[PaymentRequirements],
    ) -> Result<SignedEnvelope, ExtensionError>;

    /// Signs a receipt acknowledging that `payer` paid for the resource.
    async fn sign_receipt(&self, url: &str, payer: &str)
    -> Result<SignedEnvelope, ExtensionError>;
}

/// The signer pair configured on a resource server.
#[derive(Clone)]
pub struct OfferReceiptConfig {
    pub offer_signer: Arc<dyn OfferReceiptSigner>,
    pub receipt_signer: Arc<dyn OfferReceiptSigner>,
}

impl OfferReceiptConfig {
    /// Uses one signer for both offers and receipts.
    pub fn shared(signer: Arc<dyn OfferReceiptSigner>) -> Self {
        Self {
            offer_signer: signer.clone(),
            receipt_signer: signer,
        }
    }
}
