//! Protocol version 2 (V2) wire types.
//!
//! V2 transmits the 402 body in the `PAYMENT-REQUIRED` response header
//! (base64url JSON), describes the protected resource explicitly via
//! [`ResourceInfo`], and echoes the full selected requirement back in the
//! payment payload's `accepted` field so the server can match it by deep
//! equality. V2 also adds an explicit [`PaymentDecline`] message.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::intent::IntentTrace;
use crate::proto::{Extensions, PaymentRequirements};

/// Version 2 of the x402 protocol.
///
/// Serializes as the number `2` and fails deserialization on any other value.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct X402Version2;

impl X402Version2 {
    pub const VALUE: u8 = 2;
}

impl From<X402Version2> for u8 {
    fn from(_: X402Version2) -> Self {
        X402Version2::VALUE
    }
}

impl Serialize for X402Version2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version2 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(X402Version2)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {}",
                Self::VALUE,
                num
            )))
        }
    }
}

impl Display for X402Version2 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

/// Description of the protected resource a payment buys access to.
///
/// Shared between [`PaymentRequired`] and [`PaymentPayload`] so both sides of
/// the handshake name the same resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub url: String,
    pub description: String,
    pub mime_type: String,
}

/// A V2 402 body, carried base64url-encoded in the `PAYMENT-REQUIRED` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    pub x402_version: X402Version2,
    pub resource: ResourceInfo,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

/// A V2 signed payment. `accepted` echoes the exact [`PaymentRequirements`]
/// the client chose; servers match it against their offers by deep equality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: X402Version2,
    pub resource: ResourceInfo,
    pub accepted: PaymentRequirements,
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Extensions>,
}

/// An explicit refusal to pay, sent by a client instead of a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDecline {
    pub x402_version: X402Version2,
    pub decline: bool,
    pub resource: ResourceInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent_trace: Option<IntentTrace>,
}

impl PaymentDecline {
    pub fn new(resource: ResourceInfo, intent_trace: Option<IntentTrace>) -> Self {
        Self {
            x402_version: X402Version2,
            decline: true,
            resource,
            intent_trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource() -> ResourceInfo {
        ResourceInfo {
            url: "https://api.example.com/report".to_string(),
            description: "Quarterly report".to_string(),
            mime_type: "application/json".to_string(),
        }
    }

    #[test]
    fn test_version_marker_rejects_v1() {
        let result: Result<X402Version2, _> = serde_json::from_str("1");
        assert!(result.is_err());
    }

    #[test]
    fn test_resource_info_camel_case() {
        let value = serde_json::to_value(resource()).unwrap();
        assert_eq!(value["mimeType"], "application/json");
        assert_eq!(value["url"], "https://api.example.com/report");
    }

    #[test]
    fn test_decline_wire_shape() {
        let decline = PaymentDecline::new(resource(), None);
        let value = serde_json::to_value(&decline).unwrap();
        assert_eq!(value["x402Version"], 2);
        assert_eq!(value["decline"], json!(true));
        assert!(value.get("intentTrace").is_none());
    }
}
