//! The payment scheme system.
//!
//! A *scheme* names a payment mechanism (e.g. `exact`). The core treats
//! scheme payloads as opaque: all scheme knowledge lives in plug-in handlers
//! registered against a `(version, network pattern, scheme)` key. A scheme
//! implementation typically provides three small types, one per role:
//!
//! - [`SchemeNetworkServer`] — parses prices and decorates requirements
//!   (resource server side).
//! - [`SchemeNetworkClient`] — builds the signed scheme payload (client side).
//! - [`SchemeNetworkFacilitator`] — verifies and settles (facilitator side).
//!
//! Each role hosts its own [`SchemeRegistry`] over the matching trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::facilitator::FacilitatorError;
use crate::network::{Network, NetworkPattern};
use crate::proto::{
    PaymentPayload, PaymentRequirements, ResourceInfo, SettleResponse, SupportedKind,
    VerifyResponse,
};

/// The current x402 protocol version.
pub const X402_VERSION: u8 = 2;
/// The legacy x402 protocol version.
pub const X402_VERSION_V1: u8 = 1;

/// A price as it appears in route configuration: either a human-readable
/// money string (e.g. `"$1"`, `"0.025"`) or an explicit asset amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Money(String),
    Asset(AssetAmount),
}

impl From<&str> for Price {
    fn from(value: &str) -> Self {
        Price::Money(value.to_string())
    }
}

impl From<String> for Price {
    fn from(value: String) -> Self {
        Price::Money(value)
    }
}

/// A concrete amount of a concrete asset, in minor units, plus any
/// scheme-specific extra data derived while parsing the price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    pub amount: String,
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Errors raised by scheme handlers.
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),
    #[error("Scheme `{scheme}` cannot serve network `{network}`")]
    UnsupportedNetwork { scheme: String, network: String },
    #[error("Failed to sign payment payload: {0}")]
    Signing(String),
    #[error("{0}")]
    Other(String),
}

/// Server-side scheme capability: price parsing and requirement decoration.
pub trait SchemeNetworkServer: Send + Sync {
    /// The scheme name this handler implements (e.g. `exact`).
    fn scheme(&self) -> &str;

    /// Derives `(amount, asset, extra)` from a configured price.
    fn parse_price(&self, price: &Price, network: &Network) -> Result<AssetAmount, SchemeError>;

    /// Lets the scheme inject facilitator-advertised data (e.g. an EIP-712
    /// domain from the kind's `extra`) into the base requirements.
    fn enhance_payment_requirements(
        &self,
        base: PaymentRequirements,
        kind: &SupportedKind,
        facilitator_extensions: &[String],
    ) -> Result<PaymentRequirements, SchemeError> {
        let _ = (kind, facilitator_extensions);
        Ok(base)
    }
}

/// Client-side scheme capability: building the signed scheme payload.
#[async_trait]
pub trait SchemeNetworkClient: Send + Sync {
    fn scheme(&self) -> &str;

    /// Produces the scheme-specific signed blob for the selected requirement.
    /// `resource` is present for V2 flows and absent for V1.
    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
        resource: Option<&ResourceInfo>,
    ) -> Result<serde_json::Value, SchemeError>;
}

/// Facilitator-side scheme capability: verification and settlement.
#[async_trait]
pub trait SchemeNetworkFacilitator: Send + Sync {
    fn scheme(&self) -> &str;

    /// Scheme-specific data advertised in the facilitator's supported kinds
    /// for the given network (e.g. an EIP-712 domain, a fee payer).
    fn extra(&self, network: &Network) -> Option<serde_json::Value> {
        let _ = network;
        None
    }

    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError>;

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError>;
}

/// Failure modes of a registry lookup. Fatal for the operation, never for the
/// process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("No handlers registered for x402 version {0}")]
    NoVersion(u8),
    #[error("No handler registered for scheme `{scheme}` on network `{network}`")]
    NoNetworkOrScheme { scheme: String, network: String },
}

struct NetworkEntry<H: ?Sized> {
    pattern: NetworkPattern,
    // Insertion-ordered so duplicate registrations stay first-wins.
    schemes: Vec<(String, Arc<H>)>,
}

/// A registry of scheme handlers keyed by
/// `version → network pattern → scheme`.
///
/// Registration is idempotent: the first handler registered for a key wins
/// and later identical registrations are ignored. Network entries keep
/// insertion order so glob lookup is deterministic; an exact network key
/// always beats a glob.
pub struct SchemeRegistry<H: ?Sized> {
    versions: BTreeMap<u8, Vec<NetworkEntry<H>>>,
}

impl<H: ?Sized> Default for SchemeRegistry<H> {
    fn default() -> Self {
        Self {
            versions: BTreeMap::new(),
        }
    }
}

impl<H: ?Sized> Debug for SchemeRegistry<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let slugs: Vec<String> = self
            .entries()
            .map(|(version, pattern, scheme, _)| format!("v{version}:{pattern}:{scheme}"))
            .collect();
        f.debug_tuple("SchemeRegistry").field(&slugs).finish()
    }
}

impl<H: ?Sized> SchemeRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for `(version, pattern, scheme)`. First
    /// registration wins; a duplicate key is ignored.
    pub fn register(
        &mut self,
        version: u8,
        pattern: NetworkPattern,
        scheme: &str,
        handler: Arc<H>,
    ) {
        let entries = self.versions.entry(version).or_default();
        let entry = match entries.iter_mut().find(|e| e.pattern == pattern) {
            Some(entry) => entry,
            None => {
                entries.push(NetworkEntry {
                    pattern,
                    schemes: Vec::new(),
                });
                entries.last_mut().expect("just pushed")
            }
        };
        if entry.schemes.iter().any(|(name, _)| name == scheme) {
            return;
        }
        entry.schemes.push((scheme.to_string(), handler));
    }

    /// Registers a handler for the current protocol version.
    pub fn register_current(&mut self, pattern: NetworkPattern, scheme: &str, handler: Arc<H>) {
        self.register(X402_VERSION, pattern, scheme, handler);
    }

    /// Registers a handler for protocol version 1.
    pub fn register_v1(&mut self, pattern: NetworkPattern, scheme: &str, handler: Arc<H>) {
        self.register(X402_VERSION_V1, pattern, scheme, handler);
    }

    /// Resolves the handler for `(version, scheme, network)`.
    ///
    /// Network resolution happens first: an exact key match wins, otherwise
    /// the first glob entry (in insertion order) matching `network` is used.
    /// The scheme is then looked up within the resolved entry.
    pub fn lookup(
        &self,
        version: u8,
        scheme: &str,
        network: &Network,
    ) -> Result<&Arc<H>, RegistryError> {
        let entries = self
            .versions
            .get(&version)
            .ok_or(RegistryError::NoVersion(version))?;
        let entry = entries
            .iter()
            .find(|e| e.pattern.is_exact() && e.pattern.as_str() == network.as_str())
            .or_else(|| {
                entries
                    .iter()
                    .find(|e| !e.pattern.is_exact() && e.pattern.matches(network))
            })
            .ok_or_else(|| RegistryError::NoNetworkOrScheme {
                scheme: scheme.to_string(),
                network: network.to_string(),
            })?;
        entry
            .schemes
            .iter()
            .find(|(name, _)| name == scheme)
            .map(|(_, handler)| handler)
            .ok_or_else(|| RegistryError::NoNetworkOrScheme {
                scheme: scheme.to_string(),
                network: network.to_string(),
            })
    }

    /// Returns `true` if a handler is registered for the combination.
    pub fn contains(&self, version: u8, scheme: &str, network: &Network) -> bool {
        self.lookup(version, scheme, network).is_ok()
    }

    /// Iterates all registrations in `(version, insertion)` order.
    pub fn entries(&self) -> impl Iterator<Item = (u8, &NetworkPattern, &str, &Arc<H>)> {
        self.versions.iter().flat_map(|(version, entries)| {
            entries.iter().flat_map(move |entry| {
                entry
                    .schemes
                    .iter()
                    .map(move |(scheme, handler)| (*version, &entry.pattern, scheme.as_str(), handler))
            })
        })
    }

    /// Registered protocol versions.
    pub fn versions(&self) -> impl Iterator<Item = u8> + '_ {
        self.versions.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.values().all(|entries| entries.is_empty())
    }
}
