//! In-process facilitator for x402 payments.
//!
//! [`FacilitatorLocal`] verifies and settles payments by delegating to
//! [`SchemeNetworkFacilitator`] handlers registered in its own
//! [`SchemeRegistry`]. It implements
//! [`FacilitatorClient`](x402_types::facilitator::FacilitatorClient), so a
//! resource server can embed it directly instead of calling out over HTTP.
//!
//! # Scheme routing
//!
//! Requests are routed by the payment's `(version, network, scheme)`. A
//! request that no handler matches fails with
//! [`FacilitatorError::Unsupported`]; the facilitator never guesses.
//!
//! # Hooks
//!
//! The facilitator runs the same six lifecycle hook points as the resource
//! server, with the same semantics: a verify abort produces an
//! `isValid: false` response, a settle abort raises, and failure hooks may
//! recover with a synthesized response.

use async_trait::async_trait;
use std::str::FromStr;
use std::sync::Arc;

use x402_types::facilitator::{FacilitatorClient, FacilitatorError};
use x402_types::hooks::{
    Hooks, SettleContext, SettleFailureContext, SettleResultContext, VerifyContext,
    VerifyFailureContext, VerifyResultContext,
};
use x402_types::network::{Network, NetworkPattern};
use x402_types::proto::{
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedKind, SupportedResponse,
    VerifyResponse,
};
use x402_types::scheme::{SchemeNetworkFacilitator, SchemeRegistry};

/// An in-process x402 facilitator backed by registered scheme handlers.
pub struct FacilitatorLocal {
    schemes: SchemeRegistry<dyn SchemeNetworkFacilitator>,
    extensions: Vec<String>,
    /// Concrete networks advertised through `get_supported()`; glob
    /// registrations expand into these.
    networks: Vec<Network>,
    hooks: Hooks,
}

impl Default for FacilitatorLocal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FacilitatorLocal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorLocal")
            .field("schemes", &self.schemes)
            .field("extensions", &self.extensions)
            .field("networks", &self.networks)
            .finish_non_exhaustive()
    }
}

impl FacilitatorLocal {
    pub fn new() -> Self {
        Self {
            schemes: SchemeRegistry::new(),
            extensions: Vec::new(),
            networks: Vec::new(),
            hooks: Hooks::new(),
        }
    }

    /// Registers a scheme handler for a network pattern (current version).
    /// The scheme name comes from the handler itself.
    pub fn register(
        &mut self,
        pattern: NetworkPattern,
        handler: Arc<dyn SchemeNetworkFacilitator>,
    ) -> &mut Self {
        let scheme = handler.scheme().to_string();
        tracing::info!(pattern = %pattern, scheme = %scheme, "Registered scheme handler");
        self.schemes.register_current(pattern, &scheme, handler);
        self
    }

    /// Registers a scheme handler for protocol version 1.
    pub fn register_v1(
        &mut self,
        pattern: NetworkPattern,
        handler: Arc<dyn SchemeNetworkFacilitator>,
    ) -> &mut Self {
        let scheme = handler.scheme().to_string();
        self.schemes.register_v1(pattern, &scheme, handler);
        self
    }

    /// Adds an extension key to the advertised `extensions` list.
    pub fn register_extension(&mut self, key: impl Into<String>) -> &mut Self {
        let key = key.into();
        if !self.extensions.contains(&key) {
            self.extensions.push(key);
        }
        self
    }

    /// Adds a concrete network to advertise; glob registrations expand into
    /// the advertised networks in `get_supported()`.
    pub fn advertise_network(&mut self, network: Network) -> &mut Self {
        if !self.networks.contains(&network) {
            self.networks.push(network);
        }
        self
    }

    /// Access to the lifecycle hook lists for registration.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Expands the registry into concrete supported kinds.
    ///
    /// Exact registrations advertise their network directly. Glob
    /// registrations advertise one kind per matching entry of
    /// `concrete_networks`. Each kind carries the handler's `extra` for its
    /// network.
    pub fn build_supported(&self, concrete_networks: &[Network]) -> SupportedResponse {
        let mut kinds = Vec::new();
        for (version, pattern, scheme, handler) in self.schemes.entries() {
            if pattern.is_exact() {
                if let Ok(network) = Network::from_str(pattern.as_str()) {
                    kinds.push(SupportedKind {
                        x402_version: version,
                        scheme: scheme.to_string(),
                        network: network.to_string(),
                        extra: handler.extra(&network),
                    });
                }
            } else {
                for network in concrete_networks.iter().filter(|n| pattern.matches(n)) {
                    kinds.push(SupportedKind {
                        x402_version: version,
                        scheme: scheme.to_string(),
                        network: network.to_string(),
                        extra: handler.extra(network),
                    });
                }
            }
        }
        SupportedResponse {
            kinds,
            extensions: self.extensions.clone(),
        }
    }

    fn handler(
        &self,
        payload: &PaymentPayload,
    ) -> Result<&Arc<dyn SchemeNetworkFacilitator>, FacilitatorError> {
        let unsupported = || FacilitatorError::Unsupported {
            version: payload.x402_version(),
            scheme: payload.scheme().to_string(),
            network: payload.network().to_string(),
        };
        let network = Network::from_str(payload.network()).map_err(|_| unsupported())?;
        self.schemes
            .lookup(payload.x402_version(), payload.scheme(), &network)
            .map_err(|_| unsupported())
    }

    async fn verify_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let ctx = VerifyContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };
        if let Some(abort) = self.hooks.run_before_verify(&ctx).await {
            return Ok(VerifyResponse::invalid(abort.reason));
        }

        let result = match self.handler(payload) {
            Ok(handler) => handler.verify(payload, requirements).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(response) if response.is_valid => {
                let result_ctx = VerifyResultContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    result: response.clone(),
                };
                self.hooks.run_after_verify(&result_ctx).await;
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = VerifyFailureContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    error: response.invalid_reason.clone().unwrap_or_default(),
                };
                if let Some(recovered) = self.hooks.run_verify_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Ok(response)
            }
            Err(error) => {
                let failure_ctx = VerifyFailureContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    error: error.to_string(),
                };
                if let Some(recovered) = self.hooks.run_verify_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Err(error)
            }
        }
    }

    async fn settle_inner(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let ctx = SettleContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };
        if let Some(abort) = self.hooks.run_before_settle(&ctx).await {
            return Err(FacilitatorError::Aborted(abort.reason));
        }

        let result = match self.handler(payload) {
            Ok(handler) => handler.settle(payload, requirements).await,
            Err(error) => Err(error),
        };
        match result {
            Ok(response) if response.success => {
                let result_ctx = SettleResultContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    result: response.clone(),
                };
                self.hooks.run_after_settle(&result_ctx).await;
                Ok(response)
            }
            Ok(response) => {
                let failure_ctx = SettleFailureContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    error: response.error_reason.clone().unwrap_or_default(),
                };
                if let Some(recovered) = self.hooks.run_settle_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Ok(response)
            }
            Err(error) => {
                let failure_ctx = SettleFailureContext {
                    payload: payload.clone(),
                    requirements: requirements.clone(),
                    error: error.to_string(),
                };
                if let Some(recovered) = self.hooks.run_settle_failure(&failure_ctx).await {
                    return Ok(recovered.result);
                }
                Err(error)
            }
        }
    }
}

#[async_trait]
impl FacilitatorClient for FacilitatorLocal {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.verify_inner(payload, requirements).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.settle_inner(payload, requirements).await
    }

    async fn get_supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        Ok(self.build_supported(&self.networks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use x402_types::proto::v1;

    struct StubScheme {
        scheme: &'static str,
        extra: Option<serde_json::Value>,
    }

    #[async_trait]
    impl SchemeNetworkFacilitator for StubScheme {
        fn scheme(&self) -> &str {
            self.scheme
        }

        fn extra(&self, _network: &Network) -> Option<serde_json::Value> {
            self.extra.clone()
        }

        async fn verify(
            &self,
            _payload: &PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> Result<VerifyResponse, FacilitatorError> {
            Ok(VerifyResponse::valid("stub-payer"))
        }

        async fn settle(
            &self,
            _payload: &PaymentPayload,
            requirements: &PaymentRequirements,
        ) -> Result<SettleResponse, FacilitatorError> {
            Ok(SettleResponse::success(
                "tx",
                requirements.network.to_string(),
                "stub-payer",
            ))
        }
    }

    fn payload(network: &str) -> PaymentPayload {
        PaymentPayload::V1(v1::PaymentPayload {
            x402_version: v1::X402Version1,
            scheme: "exact".to_string(),
            network: network.to_string(),
            payload: json!({}),
        })
    }

    fn requirements(network: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: network.parse().unwrap(),
            asset: "USD".to_string(),
            amount: "1".to_string(),
            pay_to: "Alice".to_string(),
            max_timeout_seconds: 300,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_build_supported_expands_glob_registrations() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.register_v1(
            "eip155:*".parse().unwrap(),
            Arc::new(StubScheme {
                scheme: "exact",
                extra: Some(json!({ "name": "USDC", "version": "2" })),
            }),
        );
        let networks: Vec<Network> = vec![
            "eip155:8453".parse().unwrap(),
            "eip155:137".parse().unwrap(),
            "solana:mainnet".parse().unwrap(),
        ];
        let supported = facilitator.build_supported(&networks);
        let advertised: Vec<&str> = supported.kinds.iter().map(|k| k.network.as_str()).collect();
        assert_eq!(advertised, vec!["eip155:8453", "eip155:137"]);
        assert_eq!(
            supported.kinds[0].extra,
            Some(json!({ "name": "USDC", "version": "2" }))
        );
    }

    #[test]
    fn test_build_supported_includes_exact_and_extensions() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.register(
            "x402:cash".parse().unwrap(),
            Arc::new(StubScheme {
                scheme: "cash",
                extra: None,
            }),
        );
        facilitator.register_extension("bazaar");
        let supported = facilitator.build_supported(&[]);
        assert_eq!(supported.kinds.len(), 1);
        assert_eq!(supported.kinds[0].network, "x402:cash");
        assert_eq!(supported.kinds[0].x402_version, 2);
        assert_eq!(supported.extensions, vec!["bazaar".to_string()]);
    }

    #[tokio::test]
    async fn test_glob_registration_serves_concrete_network() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.register_v1(
            "eip155:*".parse().unwrap(),
            Arc::new(StubScheme {
                scheme: "exact",
                extra: None,
            }),
        );
        let response = facilitator
            .verify(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await
            .unwrap();
        assert!(response.is_valid);
    }

    #[tokio::test]
    async fn test_unregistered_scheme_is_unsupported() {
        let facilitator = FacilitatorLocal::new();
        let err = facilitator
            .verify(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await
            .unwrap_err();
        assert!(matches!(err, FacilitatorError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_verify_abort_returns_invalid_response() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.register_v1(
            "eip155:*".parse().unwrap(),
            Arc::new(StubScheme {
                scheme: "exact",
                extra: None,
            }),
        );
        facilitator.hooks_mut().on_before_verify(Box::new(|_| {
            Box::pin(async { Some(x402_types::hooks::AbortResult::new("blocked by policy")) })
        }));
        let response = facilitator
            .verify(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await
            .unwrap();
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason.as_deref(), Some("blocked by policy"));
    }

    #[tokio::test]
    async fn test_settle_abort_raises() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.register_v1(
            "eip155:*".parse().unwrap(),
            Arc::new(StubScheme {
                scheme: "exact",
                extra: None,
            }),
        );
        facilitator.hooks_mut().on_before_settle(Box::new(|_| {
            Box::pin(async { Some(x402_types::hooks::AbortResult::new("frozen account")) })
        }));
        let err = facilitator
            .settle(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await
            .unwrap_err();
        assert!(matches!(err, FacilitatorError::Aborted(reason) if reason == "frozen account"));
    }

    #[tokio::test]
    async fn test_verify_failure_hook_recovers() {
        let mut facilitator = FacilitatorLocal::new();
        facilitator.hooks_mut().on_verify_failure(Box::new(|_| {
            Box::pin(async {
                Some(x402_types::hooks::RecoveredVerify {
                    result: VerifyResponse::valid("recovered"),
                })
            })
        }));
        // No handler registered: dispatch fails, the failure hook recovers.
        let response = facilitator
            .verify(&payload("eip155:8453"), &requirements("eip155:8453"))
            .await
            .unwrap();
        assert!(response.is_valid);
        assert_eq!(response.payer.as_deref(), Some("recovered"));
    }
}
