//! The x402 payment client core.
//!
//! [`X402PaymentsClient`] consumes 402 responses: it filters the server's
//! offered requirements down to those a registered
//! [`SchemeNetworkClient`] can satisfy, lets a [`RequirementsSelector`]
//! choose among them (first supported by default), and builds the signed
//! [`PaymentPayload`](proto::PaymentPayload) — including client-side
//! extension enrichment for extensions the server declared.

use std::sync::Arc;

use x402_types::extensions::ExtensionError;
use x402_types::headers::HeaderCodecError;
use x402_types::intent::IntentTrace;
use x402_types::proto::{self, PaymentRequirements, ResourceInfo, v1, v2};
use x402_types::scheme::{RegistryError, SchemeError, SchemeNetworkClient, SchemeRegistry};

/// Errors raised by the payment client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// None of the offered requirements has a registered scheme client. The
    /// message lists what is registered to make the mismatch diagnosable.
    #[error(
        "No supported payment requirements: offered [{}]; registered versions [{}]; registered handlers [{}]",
        .offered.join(", "),
        .registered_versions.iter().map(u8::to_string).collect::<Vec<_>>().join(", "),
        .registered_handlers.join(", ")
    )]
    NoSupportedRequirements {
        offered: Vec<String>,
        registered_versions: Vec<u8>,
        registered_handlers: Vec<String>,
    },
    #[error("Payment requirements selector returned nothing")]
    NothingSelected,
    #[error("Failed to parse 402 response: {0}")]
    ParseError(String),
    #[error("Request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    #[error(transparent)]
    Codec(#[from] HeaderCodecError),
}

/// Chooses among the requirements the client can satisfy. Returns an index
/// into `candidates`.
pub trait RequirementsSelector: Send + Sync {
    fn select(&self, candidates: &[PaymentRequirements]) -> Option<usize>;
}

/// The default selector: the first supported requirement.
pub struct FirstSupported;

impl RequirementsSelector for FirstSupported {
    fn select(&self, candidates: &[PaymentRequirements]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

/// A client-side extension. Runs only when its key appears in the server's
/// extension declarations; may only write `extensions[key]` of the outgoing
/// payload.
pub trait ClientExtension: Send + Sync {
    fn key(&self) -> &str;

    /// Returns the value to store under the outgoing payload's
    /// `extensions[key]`, or `None` to leave it as declared.
    fn enrich_payment_payload(
        &self,
        payload: &v2::PaymentPayload,
        payment_required: &v2::PaymentRequired,
    ) -> Result<Option<serde_json::Value>, ExtensionError>;
}

/// The payment client: a scheme-client registry plus selection and
/// extension machinery.
pub struct X402PaymentsClient {
    schemes: SchemeRegistry<dyn SchemeNetworkClient>,
    selector: Arc<dyn RequirementsSelector>,
    extensions: Vec<Arc<dyn ClientExtension>>,
}

impl Default for X402PaymentsClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for X402PaymentsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402PaymentsClient")
            .field("schemes", &self.schemes)
            .field("extensions", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

impl X402PaymentsClient {
    pub fn new() -> Self {
        Self {
            schemes: SchemeRegistry::new(),
            selector: Arc::new(FirstSupported),
            extensions: Vec::new(),
        }
    }

    /// Registers a scheme client for a network pattern (current version).
    pub fn register(
        mut self,
        pattern: x402_types::network::NetworkPattern,
        handler: Arc<dyn SchemeNetworkClient>,
    ) -> Self {
        let scheme = handler.scheme().to_string();
        self.schemes.register_current(pattern, &scheme, handler);
        self
    }

    /// Registers a scheme client for protocol version 1.
    pub fn register_v1(
        mut self,
        pattern: x402_types::network::NetworkPattern,
        handler: Arc<dyn SchemeNetworkClient>,
    ) -> Self {
        let scheme = handler.scheme().to_string();
        self.schemes.register_v1(pattern, &scheme, handler);
        self
    }

    /// Replaces the default first-supported selector.
    pub fn with_selector(mut self, selector: Arc<dyn RequirementsSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Registers a client extension.
    pub fn register_extension(mut self, extension: Arc<dyn ClientExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Filters `offered` down to requirements a registered scheme client can
    /// satisfy and lets the selector choose. Fails with a descriptive error
    /// when nothing survives the filter.
    pub fn select_payment_requirements(
        &self,
        version: u8,
        offered: &[PaymentRequirements],
    ) -> Result<PaymentRequirements, ClientError> {
        let supported: Vec<PaymentRequirements> = offered
            .iter()
            .filter(|r| self.schemes.contains(version, &r.scheme, &r.network))
            .cloned()
            .collect();
        if supported.is_empty() {
            return Err(ClientError::NoSupportedRequirements {
                offered: offered
                    .iter()
                    .map(|r| format!("{}@{}", r.scheme, r.network))
                    .collect(),
                registered_versions: self.schemes.versions().collect(),
                registered_handlers: self
                    .schemes
                    .entries()
                    .map(|(version, pattern, scheme, _)| format!("v{version}:{pattern}:{scheme}"))
                    .collect(),
            });
        }
        let index = self
            .selector
            .select(&supported)
            .ok_or(ClientError::NothingSelected)?;
        supported
            .into_iter()
            .nth(index)
            .ok_or(ClientError::NothingSelected)
    }

    /// Builds the signed payment payload for the selected requirement.
    ///
    /// For V2, the server's extension declarations are copied into the
    /// outgoing payload and registered client extensions whose key the
    /// server declared may replace their own entry. Core fields are never
    /// touched by extensions; an enrichment failure is logged and skipped.
    pub async fn create_payment_payload(
        &self,
        payment_required: &proto::PaymentRequired,
        requirements: &PaymentRequirements,
    ) -> Result<proto::PaymentPayload, ClientError> {
        let version = payment_required.x402_version();
        let handler = self
            .schemes
            .lookup(version, &requirements.scheme, &requirements.network)?;
        match payment_required {
            proto::PaymentRequired::V1(_) => {
                let inner = handler.create_payment_payload(requirements, None).await?;
                Ok(proto::PaymentPayload::V1(v1::PaymentPayload {
                    x402_version: v1::X402Version1,
                    scheme: requirements.scheme.clone(),
                    network: requirements.network.to_string(),
                    payload: inner,
                }))
            }
            proto::PaymentRequired::V2(required) => {
                let inner = handler
                    .create_payment_payload(requirements, Some(&required.resource))
                    .await?;
                let mut payload = v2::PaymentPayload {
                    x402_version: v2::X402Version2,
                    resource: required.resource.clone(),
                    accepted: requirements.clone(),
                    payload: inner,
                    extensions: required.extensions.clone(),
                };
                for extension in &self.extensions {
                    let declared = required
                        .extensions
                        .as_ref()
                        .is_some_and(|declarations| declarations.contains_key(extension.key()));
                    if !declared {
                        continue;
                    }
                    match extension.enrich_payment_payload(&payload, required) {
                        Ok(Some(value)) => {
                            payload
                                .extensions
                                .get_or_insert_with(Default::default)
                                .insert(extension.key().to_string(), value);
                        }
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(
                                extension = %extension.key(),
                                %error,
                                "Client extension enrichment failed; sending payload without it"
                            );
                        }
                    }
                }
                Ok(proto::PaymentPayload::V2(payload))
            }
        }
    }

    /// Builds an explicit refusal to pay for a resource.
    pub fn decline(
        &self,
        resource: ResourceInfo,
        intent_trace: Option<IntentTrace>,
    ) -> v2::PaymentDecline {
        v2::PaymentDecline::new(resource, intent_trace)
    }
}
