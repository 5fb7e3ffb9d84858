//! Wire format types for x402 payment messages.
//!
//! This module defines the JSON shapes exchanged between resource servers,
//! clients, and facilitators. Both protocol versions share
//! [`PaymentRequirements`], [`VerifyResponse`], and [`SettleResponse`];
//! version-specific envelopes live in [`v1`] and [`v2`], and the
//! [`PaymentPayload`] / [`PaymentRequired`] enums discriminate between them
//! by the `x402Version` field.
//!
//! All types serialize to JSON with camelCase field names. Amount fields are
//! decimal strings in the asset's minor units so they survive JSON parsers
//! that cannot represent large integers.

use serde::{Deserialize, Serialize};
use serde_with::{VecSkipError, serde_as};

use crate::intent::IntentTrace;
use crate::network::Network;

pub mod v1;
pub mod v2;

pub use v2::{PaymentDecline, ResourceInfo};

/// Extension data keyed by extension name; values are extension-specific JSON.
pub type Extensions = serde_json::Map<String, serde_json::Value>;

/// Default client-authorization validity window, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// One acceptable way to pay for a resource.
///
/// Built per request from the route configuration and the facilitator's
/// advertised capabilities; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: String,
    pub network: Network,
    /// Token or currency identifier (e.g. an ERC-20 address, `USD`).
    pub asset: String,
    /// Decimal string in the asset's minor units; positive integer-valued.
    pub amount: String,
    /// Recipient identifier.
    pub pay_to: String,
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,
    /// Scheme-specific data (e.g. an EIP-712 domain). Always an object.
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_max_timeout_seconds() -> u64 {
    DEFAULT_MAX_TIMEOUT_SECONDS
}

/// Error returned by [`PaymentRequirements::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequirementsError {
    #[error("Payment requirements field `{0}` must be non-empty")]
    EmptyField(&'static str),
    #[error("Payment requirements amount `{0}` must be a positive integer string")]
    InvalidAmount(String),
    #[error("Payment requirements maxTimeoutSeconds must be positive")]
    InvalidTimeout,
}

impl PaymentRequirements {
    /// Checks the structural invariants: non-empty string fields, a positive
    /// integer-valued amount, and a positive timeout.
    pub fn validate(&self) -> Result<(), RequirementsError> {
        if self.scheme.is_empty() {
            return Err(RequirementsError::EmptyField("scheme"));
        }
        if self.asset.is_empty() {
            return Err(RequirementsError::EmptyField("asset"));
        }
        if self.pay_to.is_empty() {
            return Err(RequirementsError::EmptyField("payTo"));
        }
        let is_positive_integer = !self.amount.is_empty()
            && self.amount.bytes().all(|b| b.is_ascii_digit())
            && self.amount.bytes().any(|b| b != b'0');
        if !is_positive_integer {
            return Err(RequirementsError::InvalidAmount(self.amount.clone()));
        }
        if self.max_timeout_seconds == 0 {
            return Err(RequirementsError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Result of verifying a [`PaymentPayload`] against [`PaymentRequirements`].
///
/// Business-level rejection is expressed as `is_valid: false` with a reason
/// and optionally an [`IntentTrace`]; it is returned, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_trace: Option<IntentTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl VerifyResponse {
    pub fn valid(payer: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
            intent_trace: None,
            extensions: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
            intent_trace: None,
            extensions: None,
        }
    }

    pub fn invalid_with_trace(reason: impl Into<String>, intent_trace: IntentTrace) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
            intent_trace: Some(intent_trace),
            extensions: None,
        }
    }
}

/// Result of settling a verified payment.
///
/// `transaction` is an opaque settlement identifier and may be empty when
/// settlement failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    pub transaction: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_trace: Option<IntentTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

impl SettleResponse {
    pub fn success(
        transaction: impl Into<String>,
        network: impl Into<String>,
        payer: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            error_reason: None,
            payer: Some(payer.into()),
            transaction: transaction.into(),
            network: network.into(),
            intent_trace: None,
            extensions: None,
        }
    }

    pub fn error(reason: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            success: false,
            error_reason: Some(reason.into()),
            payer: None,
            transaction: String::new(),
            network: network.into(),
            intent_trace: None,
            extensions: None,
        }
    }

    pub fn error_with_trace(
        reason: impl Into<String>,
        network: impl Into<String>,
        intent_trace: IntentTrace,
    ) -> Self {
        let mut response = Self::error(reason, network);
        response.intent_trace = Some(intent_trace);
        response
    }
}

/// One `(version, scheme, network)` triple a facilitator can handle.
///
/// `network` may be a concrete CAIP-2 identifier or a `*` pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedKind {
    pub x402_version: u8,
    pub scheme: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Response from a facilitator's `GET /supported` endpoint.
///
/// A malformed entry in `kinds` is skipped rather than poisoning the whole
/// response.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedResponse {
    #[serde_as(as = "VecSkipError<_>")]
    pub kinds: Vec<SupportedKind>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// A signed payment of either protocol version, discriminated by
/// `x402Version`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaymentPayload {
    V1(v1::PaymentPayload),
    V2(v2::PaymentPayload),
}

impl PaymentPayload {
    pub fn x402_version(&self) -> u8 {
        match self {
            PaymentPayload::V1(_) => v1::X402Version1::VALUE,
            PaymentPayload::V2(_) => v2::X402Version2::VALUE,
        }
    }

    /// The scheme the payment uses: top-level in V1, via `accepted` in V2.
    pub fn scheme(&self) -> &str {
        match self {
            PaymentPayload::V1(p) => &p.scheme,
            PaymentPayload::V2(p) => &p.accepted.scheme,
        }
    }

    /// The network the payment targets: top-level in V1, via `accepted` in V2.
    pub fn network(&self) -> &str {
        match self {
            PaymentPayload::V1(p) => &p.network,
            PaymentPayload::V2(p) => p.accepted.network.as_str(),
        }
    }

    /// The scheme-specific signed blob.
    pub fn inner_payload(&self) -> &serde_json::Value {
        match self {
            PaymentPayload::V1(p) => &p.payload,
            PaymentPayload::V2(p) => &p.payload,
        }
    }

    pub fn resource(&self) -> Option<&ResourceInfo> {
        match self {
            PaymentPayload::V1(_) => None,
            PaymentPayload::V2(p) => Some(&p.resource),
        }
    }
}

impl<'de> Deserialize<'de> for PaymentPayload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let version = value
            .get("x402Version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| serde::de::Error::missing_field("x402Version"))?;
        match version {
            1 => serde_json::from_value(value)
                .map(PaymentPayload::V1)
                .map_err(serde::de::Error::custom),
            2 => serde_json::from_value(value)
                .map(PaymentPayload::V2)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "unsupported x402 version {other}"
            ))),
        }
    }
}

/// A 402 body of either protocol version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaymentRequired {
    V1(v1::PaymentRequired),
    V2(v2::PaymentRequired),
}

impl PaymentRequired {
    pub fn x402_version(&self) -> u8 {
        match self {
            PaymentRequired::V1(_) => v1::X402Version1::VALUE,
            PaymentRequired::V2(_) => v2::X402Version2::VALUE,
        }
    }

    pub fn accepts(&self) -> &[PaymentRequirements] {
        match self {
            PaymentRequired::V1(r) => &r.accepts,
            PaymentRequired::V2(r) => &r.accepts,
        }
    }

    pub fn extensions(&self) -> Option<&Extensions> {
        match self {
            PaymentRequired::V1(_) => None,
            PaymentRequired::V2(r) => r.extensions.as_ref(),
        }
    }
}

impl<'de> Deserialize<'de> for PaymentRequired {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        let version = value
            .get("x402Version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| serde::de::Error::missing_field("x402Version"))?;
        match version {
            1 => serde_json::from_value(value)
                .map(PaymentRequired::V1)
                .map_err(serde::de::Error::custom),
            2 => serde_json::from_value(value)
                .map(PaymentRequired::V2)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "unsupported x402 version {other}"
            ))),
        }
    }
}
