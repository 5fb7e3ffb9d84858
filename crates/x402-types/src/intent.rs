//! Structured failure diagnostics for payment flows.
//!
//! When a payment is declined, fails verification, or fails settlement, the
//! responsible party attaches an [`IntentTrace`]: a machine-readable
//! [`ReasonCode`] from a fixed taxonomy, an optional short summary, flat
//! scalar metadata, and a suggested [`Remediation`]. Traces travel inside
//! decline, verify, and settle responses and are open-ended by design: the
//! reason codes are fixed, the metadata and remediation details are free maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Maximum length of a trace summary; longer summaries are truncated.
const TRACE_SUMMARY_MAX: usize = 500;

/// The fixed taxonomy of payment failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// The payer's balance does not cover the required amount.
    InsufficientFunds,
    /// The payment signature does not verify.
    SignatureInvalid,
    /// The payment authorization window has passed.
    SignatureExpired,
    /// The payment authorization window has not opened yet.
    SignatureNotYetValid,
    /// The authorized amount differs from the required amount.
    AmountMismatch,
    /// The payment recipient differs from the required recipient.
    RecipientMismatch,
    /// The payment network differs from the required network.
    NetworkMismatch,
    /// The payment asset differs from the required asset.
    AssetMismatch,
    /// The authorization nonce was already consumed.
    NonceAlreadyUsed,
    /// The settlement transaction reverted on-chain.
    TransactionReverted,
    /// The settlement transaction was not confirmed in time.
    TransactionTimeout,
    /// A smart-wallet interaction failed.
    SmartWalletError,
    /// The payer's smart wallet is not deployed.
    UndeployedWallet,
    /// The facilitator itself failed.
    FacilitatorError,
    /// Anything not covered by the taxonomy.
    Other,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", json.trim_matches('"'))
    }
}

/// A suggested next step for the payer.
///
/// `action` names the remediation (e.g. `top_up`, `re_sign`, `retry_after`);
/// action-specific fields such as `shortfall` or `waitSeconds` are carried in
/// the flattened `details` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remediation {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Remediation {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: None,
            details: Map::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }
}

/// A structured failure explanation attached to decline, verify, and settle
/// responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentTrace {
    pub reason_code: ReasonCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

impl IntentTrace {
    pub fn new(reason_code: ReasonCode) -> Self {
        Self {
            reason_code,
            trace_summary: None,
            metadata: None,
            remediation: None,
        }
    }

    /// Sets the trace summary, truncating to 500 characters.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        let summary: String = summary.into();
        let truncated = if summary.chars().count() > TRACE_SUMMARY_MAX {
            summary.chars().take(TRACE_SUMMARY_MAX).collect()
        } else {
            summary
        };
        self.trace_summary = Some(truncated);
        self
    }

    /// Adds one flat metadata entry. Values are expected to be scalars.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_remediation(mut self, remediation: Remediation) -> Self {
        self.remediation = Some(remediation);
        self
    }

    /// The payer cannot cover the amount; suggests topping up by `shortfall`
    /// minor units.
    pub fn insufficient_funds(shortfall: &str) -> Self {
        Self::new(ReasonCode::InsufficientFunds)
            .with_summary(format!("Balance short by {shortfall}"))
            .with_metadata("shortfall", json!(shortfall))
            .with_remediation(
                Remediation::new("top_up").with_detail("shortfall", json!(shortfall)),
            )
    }

    /// The signature does not verify against the payload.
    pub fn signature_invalid() -> Self {
        Self::new(ReasonCode::SignatureInvalid)
            .with_summary("Payment signature does not verify")
            .with_remediation(Remediation::new("re_sign"))
    }

    /// The authorization expired at `expired_at` (unix seconds).
    pub fn signature_expired(expired_at: u64) -> Self {
        Self::new(ReasonCode::SignatureExpired)
            .with_summary(format!("Payment authorization expired at {expired_at}"))
            .with_metadata("expiredAt", json!(expired_at))
            .with_remediation(Remediation::new("re_sign").with_reason("authorization expired"))
    }

    /// The authorization opens in `wait_seconds`; suggests retrying after.
    pub fn signature_not_yet_valid(wait_seconds: u64) -> Self {
        Self::new(ReasonCode::SignatureNotYetValid)
            .with_summary(format!("Payment authorization opens in {wait_seconds}s"))
            .with_metadata("waitSeconds", json!(wait_seconds))
            .with_remediation(
                Remediation::new("retry_after").with_detail("waitSeconds", json!(wait_seconds)),
            )
    }

    /// The authorized amount differs from the required one.
    pub fn amount_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(ReasonCode::AmountMismatch)
            .with_summary(format!("Expected amount {expected}, got {actual}"))
            .with_metadata("expected", json!(expected))
            .with_metadata("actual", json!(actual))
            .with_remediation(
                Remediation::new("correct_amount").with_detail("amount", json!(expected)),
            )
    }

    /// The payment recipient differs from the required one.
    pub fn recipient_mismatch(expected: &str) -> Self {
        Self::new(ReasonCode::RecipientMismatch)
            .with_summary(format!("Payment must be addressed to {expected}"))
            .with_remediation(
                Remediation::new("correct_recipient").with_detail("payTo", json!(expected)),
            )
    }

    /// The payment network differs from the required one.
    pub fn network_mismatch(expected: &str) -> Self {
        Self::new(ReasonCode::NetworkMismatch)
            .with_summary(format!("Payment must target network {expected}"))
            .with_remediation(
                Remediation::new("correct_network").with_detail("network", json!(expected)),
            )
    }

    /// The payment asset differs from the required one.
    pub fn asset_mismatch(expected: &str) -> Self {
        Self::new(ReasonCode::AssetMismatch)
            .with_summary(format!("Payment must use asset {expected}"))
            .with_remediation(
                Remediation::new("correct_asset").with_detail("asset", json!(expected)),
            )
    }

    /// The authorization nonce was already consumed.
    pub fn nonce_already_used() -> Self {
        Self::new(ReasonCode::NonceAlreadyUsed)
            .with_summary("Authorization nonce already consumed")
            .with_remediation(Remediation::new("re_sign").with_reason("nonce already used"))
    }

    /// The settlement transaction reverted.
    pub fn transaction_reverted(transaction: &str) -> Self {
        Self::new(ReasonCode::TransactionReverted)
            .with_summary(format!("Settlement transaction {transaction} reverted"))
            .with_metadata("transaction", json!(transaction))
            .with_remediation(Remediation::new("retry"))
    }

    /// Settlement confirmation timed out; suggests retrying after
    /// `wait_seconds`.
    pub fn transaction_timeout(wait_seconds: u64) -> Self {
        Self::new(ReasonCode::TransactionTimeout)
            .with_summary("Settlement transaction was not confirmed in time")
            .with_remediation(
                Remediation::new("retry_after").with_detail("waitSeconds", json!(wait_seconds)),
            )
    }

    /// A smart-wallet interaction failed.
    pub fn smart_wallet_error(detail: &str) -> Self {
        Self::new(ReasonCode::SmartWalletError).with_summary(detail)
    }

    /// The payer's smart wallet is not deployed.
    pub fn undeployed_wallet(payer: &str) -> Self {
        Self::new(ReasonCode::UndeployedWallet)
            .with_summary(format!("Wallet {payer} is not deployed"))
            .with_metadata("payer", json!(payer))
            .with_remediation(Remediation::new("deploy_wallet"))
    }

    /// The facilitator failed operationally.
    pub fn facilitator_error(detail: &str) -> Self {
        Self::new(ReasonCode::FacilitatorError)
            .with_summary(detail)
            .with_remediation(Remediation::new("retry"))
    }

    /// A failure outside the fixed taxonomy.
    pub fn other(detail: &str) -> Self {
        Self::new(ReasonCode::Other).with_summary(detail)
    }
}
