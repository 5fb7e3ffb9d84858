//! HTTP header encoding for x402 wire messages.
//!
//! Every wire header is base64url of a UTF-8 JSON document:
//!
//! - [`PAYMENT_REQUIRED_HEADER`] (response): the V2 402 body.
//! - [`PAYMENT_SIGNATURE_HEADER`] (request, V2) / [`X_PAYMENT_HEADER`]
//!   (request, V1): the signed payment payload.
//! - [`PAYMENT_RESPONSE_HEADER`] (response, V2) /
//!   [`X_PAYMENT_RESPONSE_HEADER`] (response, V1): the settlement result plus
//!   the requirements it settled.
//!
//! Decoding validates shape before deserializing and maps every violation to
//! a specific [`HeaderCodecError`] variant; clients depend on these messages
//! for diagnostics, so they are part of the protocol's observable surface.
//! Encoding validates the same schema: emitting a malformed header is a
//! programming error and fails synchronously.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::{self, PaymentRequirements, SettleResponse, v2};

/// Response header carrying the V2 402 body.
pub const PAYMENT_REQUIRED_HEADER: &str = "PAYMENT-REQUIRED";
/// Request header carrying a V2 payment payload.
pub const PAYMENT_SIGNATURE_HEADER: &str = "PAYMENT-SIGNATURE";
/// Request header carrying a V1 payment payload.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";
/// Response header carrying a V2 settlement result.
pub const PAYMENT_RESPONSE_HEADER: &str = "PAYMENT-RESPONSE";
/// Response header carrying a V1 settlement result.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Errors produced while encoding or decoding wire headers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderCodecError {
    #[error("Invalid payment header format: empty header")]
    Empty,
    #[error("Invalid payment header format: not valid base64")]
    NotBase64,
    #[error("Invalid payment header format: not valid JSON")]
    NotJson,
    #[error("Invalid payment header format: not a JSON object")]
    NotAnObject,
    #[error("Invalid payment payload: missing field `{0}`")]
    MissingField(String),
    #[error("Invalid payment payload: field `{field}` must be {expected}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
    },
    #[error("Invalid payment payload: unsupported x402 version {0}")]
    UnsupportedVersion(u64),
    #[error("Invalid payment payload: {0}")]
    Schema(String),
}

/// Either a signed payment or an explicit decline, as found in a payment
/// request header.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentHeader {
    Payload(proto::PaymentPayload),
    Decline(v2::PaymentDecline),
}

/// The settlement result plus the requirements it settled, as carried in the
/// payment response header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponseEnvelope {
    #[serde(flatten)]
    pub settlement: SettleResponse,
    pub requirements: PaymentRequirements,
}

fn decode_json_object(raw: &str) -> Result<Value, HeaderCodecError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(HeaderCodecError::Empty);
    }
    // V2 encoders emit base64url; V1 SDKs emit the standard alphabet.
    let bytes = URL_SAFE
        .decode(trimmed)
        .or_else(|_| STANDARD.decode(trimmed))
        .map_err(|_| HeaderCodecError::NotBase64)?;
    let value: Value = serde_json::from_slice(&bytes).map_err(|_| HeaderCodecError::NotJson)?;
    if !value.is_object() {
        return Err(HeaderCodecError::NotAnObject);
    }
    Ok(value)
}

fn encode_json(value: &Value) -> String {
    URL_SAFE.encode(value.to_string())
}

fn require_string(
    object: &serde_json::Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<(), HeaderCodecError> {
    match object.get(field) {
        None => Err(HeaderCodecError::MissingField(path.to_string())),
        Some(Value::String(_)) => Ok(()),
        Some(_) => Err(HeaderCodecError::UnexpectedType {
            field: path.to_string(),
            expected: "a string",
        }),
    }
}

fn require_object<'a>(
    object: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Result<&'a serde_json::Map<String, Value>, HeaderCodecError> {
    match object.get(field) {
        None => Err(HeaderCodecError::MissingField(field.to_string())),
        Some(Value::Object(inner)) => Ok(inner),
        Some(_) => Err(HeaderCodecError::UnexpectedType {
            field: field.to_string(),
            expected: "an object",
        }),
    }
}

fn payload_version(object: &serde_json::Map<String, Value>) -> Result<u64, HeaderCodecError> {
    match object.get("x402Version") {
        None => Err(HeaderCodecError::MissingField("x402Version".to_string())),
        Some(Value::Number(n)) => n.as_u64().ok_or(HeaderCodecError::UnexpectedType {
            field: "x402Version".to_string(),
            expected: "a number",
        }),
        Some(_) => Err(HeaderCodecError::UnexpectedType {
            field: "x402Version".to_string(),
            expected: "a number",
        }),
    }
}

/// Validates the schema of a payment payload document without deserializing.
fn validate_payload_schema(object: &serde_json::Map<String, Value>) -> Result<(), HeaderCodecError> {
    match payload_version(object)? {
        1 => {
            require_string(object, "scheme", "scheme")?;
            require_string(object, "network", "network")?;
            require_object(object, "payload")?;
            Ok(())
        }
        2 => {
            let resource = require_object(object, "resource")?;
            require_string(resource, "url", "resource.url")?;
            require_string(resource, "description", "resource.description")?;
            require_string(resource, "mimeType", "resource.mimeType")?;
            require_object(object, "accepted")?;
            require_object(object, "payload")?;
            Ok(())
        }
        other => Err(HeaderCodecError::UnsupportedVersion(other)),
    }
}

/// Decodes a `PAYMENT-SIGNATURE` / `X-PAYMENT` header into a payment payload.
pub fn decode_payment_signature_header(
    raw: &str,
) -> Result<proto::PaymentPayload, HeaderCodecError> {
    let value = decode_json_object(raw)?;
    let object = value.as_object().expect("checked object");
    validate_payload_schema(object)?;
    serde_json::from_value(value).map_err(|e| HeaderCodecError::Schema(e.to_string()))
}

/// Decodes a payment request header that may be either a signed payment or an
/// explicit decline.
pub fn decode_payment_header(raw: &str) -> Result<PaymentHeader, HeaderCodecError> {
    let value = decode_json_object(raw)?;
    let object = value.as_object().expect("checked object");
    if object.get("decline").and_then(Value::as_bool) == Some(true) {
        let decline: v2::PaymentDecline =
            serde_json::from_value(value).map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
        return Ok(PaymentHeader::Decline(decline));
    }
    validate_payload_schema(object)?;
    let payload: proto::PaymentPayload =
        serde_json::from_value(value).map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
    Ok(PaymentHeader::Payload(payload))
}

/// Encodes a payment payload for the `PAYMENT-SIGNATURE` / `X-PAYMENT` header.
pub fn encode_payment_signature_header(
    payload: &proto::PaymentPayload,
) -> Result<String, HeaderCodecError> {
    let value =
        serde_json::to_value(payload).map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
    let object = value.as_object().ok_or(HeaderCodecError::NotAnObject)?;
    validate_payload_schema(object)?;
    Ok(encode_json(&value))
}

/// Encodes a payment decline for the `PAYMENT-SIGNATURE` header.
pub fn encode_payment_decline_header(
    decline: &v2::PaymentDecline,
) -> Result<String, HeaderCodecError> {
    let value =
        serde_json::to_value(decline).map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
    Ok(encode_json(&value))
}

/// Decodes a `PAYMENT-REQUIRED` header into a V2 402 body.
pub fn decode_payment_required_header(
    raw: &str,
) -> Result<v2::PaymentRequired, HeaderCodecError> {
    let value = decode_json_object(raw)?;
    let object = value.as_object().expect("checked object");
    payload_version(object)?;
    match object.get("accepts") {
        None => return Err(HeaderCodecError::MissingField("accepts".to_string())),
        Some(Value::Array(_)) => {}
        Some(_) => {
            return Err(HeaderCodecError::UnexpectedType {
                field: "accepts".to_string(),
                expected: "an array",
            });
        }
    }
    serde_json::from_value(value).map_err(|e| HeaderCodecError::Schema(e.to_string()))
}

/// Encodes a V2 402 body for the `PAYMENT-REQUIRED` header.
pub fn encode_payment_required_header(
    payment_required: &v2::PaymentRequired,
) -> Result<String, HeaderCodecError> {
    let value = serde_json::to_value(payment_required)
        .map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
    Ok(encode_json(&value))
}

/// Decodes a `PAYMENT-RESPONSE` / `X-PAYMENT-RESPONSE` header.
pub fn decode_payment_response_header(
    raw: &str,
) -> Result<PaymentResponseEnvelope, HeaderCodecError> {
    let value = decode_json_object(raw)?;
    serde_json::from_value(value).map_err(|e| HeaderCodecError::Schema(e.to_string()))
}

/// Encodes a settlement result plus its requirements for the
/// `PAYMENT-RESPONSE` / `X-PAYMENT-RESPONSE` header.
pub fn encode_payment_response_header(
    settlement: &SettleResponse,
    requirements: &PaymentRequirements,
) -> Result<String, HeaderCodecError> {
    let envelope = PaymentResponseEnvelope {
        settlement: settlement.clone(),
        requirements: requirements.clone(),
    };
    let value =
        serde_json::to_value(&envelope).map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
    Ok(encode_json(&value))
}
