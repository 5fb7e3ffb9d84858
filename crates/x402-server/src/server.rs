//! The x402 resource server core.
//!
//! [`X402ResourceServer`] guards resources: it builds payment requirements
//! from route configuration, emits 402 bodies, and dispatches verify/settle
//! calls to the facilitator registered for the payment's
//! `(version, network, scheme)` — with the full before/after/failure hook
//! lifecycle around both operations.
//!
//! All registration (`register*`, hooks, extensions) happens before
//! [`X402ResourceServer::initialize`]; afterwards the server is read-only and
//! safe to share across request tasks behind an `Arc`.

use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use x402_types::facilitator::{FacilitatorClient, FacilitatorError};
use x402_types::hooks::{
    Hooks, SettleContext, SettleFailureContext, SettleResultContext, VerifyContext,
    VerifyFailureContext, VerifyResultContext,
};
use x402_types::network::{Network, NetworkPattern};
use x402_types::proto::{
    self, DEFAULT_MAX_TIMEOUT_SECONDS, Extensions, PaymentRequirements, RequirementsError,
    ResourceInfo, SettleResponse, SupportedKind, VerifyResponse, v2,
};
use x402_types::scheme::{
    RegistryError, SchemeError, SchemeNetworkServer, SchemeRegistry, X402_VERSION,
};

use crate::config::RouteConfig;
use crate::extensions::{
    PaymentRequiredContext, ServerExtension, SettlementContext, VerificationContext,
};
use crate::receipts::{OFFER_RECEIPTS_KEY, OfferReceiptConfig};

/// Errors raised by the resource server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// One or more route payment options lack a scheme handler or a
    /// supporting facilitator. All problems are collected and reported
    /// together.
    #[error("Route configuration invalid: {}", .0.join("; "))]
    RouteConfiguration(Vec<String>),
    #[error("Resource server is not initialized; call initialize() first")]
    NotInitialized,
    /// A before-settle hook aborted the settlement. An aborted settlement is
    /// an operational exception, not a business-level decline.
    #[error("Payment settlement aborted: {0}")]
    SettleAborted(String),
    #[error(transparent)]
    Facilitator(#[from] FacilitatorError),
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Requirements(#[from] RequirementsError),
}

/// One facilitator capability recorded during `initialize()`.
struct DirectoryEntry {
    version: u8,
    scheme: String,
    pattern: NetworkPattern,
    kind: SupportedKind,
    client: Arc<dyn FacilitatorClient>,
    facilitator_extensions: Vec<String>,
}

/// The `(version, network, scheme) → facilitator` map built at startup.
///
/// Entries are kept in discovery order (client order, then kind order), so
/// the first facilitator advertising a combination wins and pattern lookups
/// are deterministic.
#[derive(Default)]
struct FacilitatorDirectory {
    entries: Vec<DirectoryEntry>,
}

impl FacilitatorDirectory {
    fn insert_first_wins(&mut self, entry: DirectoryEntry) {
        let exists = self.entries.iter().any(|e| {
            e.version == entry.version
                && e.scheme == entry.scheme
                && e.pattern.as_str() == entry.pattern.as_str()
        });
        if !exists {
            self.entries.push(entry);
        }
    }

    fn lookup(&self, version: u8, scheme: &str, network: &Network) -> Option<&DirectoryEntry> {
        self.entries
            .iter()
            .find(|e| {
                e.version == version
                    && e.scheme == scheme
                    && e.pattern.is_exact()
                    && e.pattern.as_str() == network.as_str()
            })
            .or_else(|| {
                self.entries.iter().find(|e| {
                    e.version == version && e.scheme == scheme && e.pattern.matches(network)
                })
            })
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of [`X402ResourceServer::process_payment_request`].
#[derive(Debug)]
pub enum ProcessedPayment {
    /// Payment is missing, mismatched, or invalid: answer 402 with this body.
    Required(v2::PaymentRequired),
    /// Payment verified: deliver the resource, then settle.
    ReadyToDeliver {
        payload: proto::PaymentPayload,
        requirements: PaymentRequirements,
        verification: VerifyResponse,
    },
}

/// The resource server core shared by all transports.
pub struct X402ResourceServer {
    facilitator_clients: Vec<Arc<dyn FacilitatorClient>>,
    schemes: SchemeRegistry<dyn SchemeNetworkServer>,
    extensions: Vec<Arc<dyn ServerExtension>>,
    hooks: Hooks,
    offer_receipts: Option<OfferReceiptConfig>,
    directory: FacilitatorDirectory,
    initialized: bool,
}

impl std::fmt::Debug for X402ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402ResourceServer")
            .field("facilitator_clients", &self.facilitator_clients.len())
            .field("schemes", &self.schemes)
            .field("extensions", &self.extensions.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl X402ResourceServer {
    /// Creates a server talking to the given facilitators. Client order
    /// matters: earlier clients win when several advertise the same kind.
    pub fn new(facilitator_clients: Vec<Arc<dyn FacilitatorClient>>) -> Self {
        Self {
            facilitator_clients,
            schemes: SchemeRegistry::new(),
            extensions: Vec::new(),
            hooks: Hooks::new(),
            offer_receipts: None,
            directory: FacilitatorDirectory::default(),
            initialized: false,
        }
    }

    /// Convenience constructor for a single facilitator.
    pub fn with_facilitator(client: Arc<dyn FacilitatorClient>) -> Self {
        Self::new(vec![client])
    }

    /// Registers a scheme handler for a network (current protocol version).
    /// The scheme name comes from the handler itself.
    pub fn register(
        &mut self,
        pattern: NetworkPattern,
        handler: Arc<dyn SchemeNetworkServer>,
    ) -> &mut Self {
        let scheme = handler.scheme().to_string();
        self.schemes.register_current(pattern, &scheme, handler);
        self
    }

    /// Registers a scheme handler for protocol version 1.
    pub fn register_v1(
        &mut self,
        pattern: NetworkPattern,
        handler: Arc<dyn SchemeNetworkServer>,
    ) -> &mut Self {
        let scheme = handler.scheme().to_string();
        self.schemes.register_v1(pattern, &scheme, handler);
        self
    }

    /// Registers a server extension. Enrichment runs in registration order.
    pub fn register_extension(&mut self, extension: Arc<dyn ServerExtension>) -> &mut Self {
        self.extensions.push(extension);
        self
    }

    /// Access to the lifecycle hook lists for registration.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Configures offer/receipt signing.
    pub fn with_offer_receipts(&mut self, config: OfferReceiptConfig) -> &mut Self {
        self.offer_receipts = Some(config);
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Builds the facilitator directory and validates the route table.
    ///
    /// Each configured facilitator is asked for its supported kinds; a
    /// failing `get_supported` is logged and skipped. Afterwards every
    /// `(scheme, network)` payment option must have both a local scheme
    /// handler and a supporting facilitator; all missing entries are
    /// collected into a single [`ServerError::RouteConfiguration`].
    ///
    /// Calling `initialize` again rebuilds the directory atomically.
    pub async fn initialize(&mut self, routes: &[RouteConfig]) -> Result<(), ServerError> {
        let mut directory = FacilitatorDirectory::default();
        for (index, client) in self.facilitator_clients.iter().enumerate() {
            let supported = match client.get_supported().await {
                Ok(supported) => supported,
                Err(error) => {
                    tracing::warn!(
                        facilitator = index,
                        %error,
                        "Facilitator getSupported() failed; skipping"
                    );
                    continue;
                }
            };
            for kind in supported.kinds {
                let pattern = match NetworkPattern::from_str(&kind.network) {
                    Ok(pattern) => pattern,
                    Err(error) => {
                        tracing::warn!(
                            facilitator = index,
                            network = %kind.network,
                            %error,
                            "Facilitator advertised an invalid network; skipping kind"
                        );
                        continue;
                    }
                };
                tracing::debug!(
                    facilitator = index,
                    version = kind.x402_version,
                    scheme = %kind.scheme,
                    network = %kind.network,
                    "Recording facilitator capability"
                );
                directory.insert_first_wins(DirectoryEntry {
                    version: kind.x402_version,
                    scheme: kind.scheme.clone(),
                    pattern,
                    kind,
                    client: client.clone(),
                    facilitator_extensions: supported.extensions.clone(),
                });
            }
        }
        if directory.is_empty() && !self.facilitator_clients.is_empty() {
            tracing::warn!("No facilitator reported any supported payment kinds");
        }

        let mut problems = Vec::new();
        for (route_index, route) in routes.iter().enumerate() {
            for option in &route.accepts {
                if !self
                    .schemes
                    .contains(X402_VERSION, &option.scheme, &option.network)
                {
                    problems.push(format!(
                        "route {route_index}: no scheme handler registered for `{}` on `{}`",
                        option.scheme, option.network
                    ));
                }
                if directory
                    .lookup(X402_VERSION, &option.scheme, &option.network)
                    .is_none()
                {
                    problems.push(format!(
                        "route {route_index}: no facilitator supports `{}` on `{}`",
                        option.scheme, option.network
                    ));
                }
            }
            // Declarative extension schemas are advisory: a mismatch is
            // logged, never fatal.
            if let Some(declarations) = &route.extensions {
                for key in declarations.keys() {
                    if !self.extensions.iter().any(|e| e.key() == key) {
                        tracing::warn!(
                            route = route_index,
                            extension = %key,
                            "Route declares an extension with no registered handler"
                        );
                    }
                }
            }
        }
        if !problems.is_empty() {
            return Err(ServerError::RouteConfiguration(problems));
        }

        self.directory = directory;
        self.initialized = true;
        Ok(())
    }

    /// Returns the advertised kind for a combination, if any facilitator
    /// supports it.
    pub fn supported_kind(
        &self,
        version: u8,
        scheme: &str,
        network: &Network,
    ) -> Option<&SupportedKind> {
        self.directory
            .lookup(version, scheme, network)
            .map(|entry| &entry.kind)
    }

    /// Builds the payment requirements for one route.
    ///
    /// Options whose scheme has no registered handler, or no supporting
    /// facilitator, are skipped with a warning; the returned list may
    /// therefore be empty (callers decide how to surface that).
    pub fn build_payment_requirements(
        &self,
        config: &RouteConfig,
    ) -> Result<Vec<PaymentRequirements>, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }
        let mut requirements = Vec::with_capacity(config.accepts.len());
        for option in &config.accepts {
            let handler = match self
                .schemes
                .lookup(X402_VERSION, &option.scheme, &option.network)
            {
                Ok(handler) => handler,
                Err(error) => {
                    tracing::warn!(
                        scheme = %option.scheme,
                        network = %option.network,
                        %error,
                        "No scheme handler registered; skipping payment option"
                    );
                    continue;
                }
            };
            let entry = match self
                .directory
                .lookup(X402_VERSION, &option.scheme, &option.network)
            {
                Some(entry) => entry,
                None => {
                    tracing::warn!(
                        scheme = %option.scheme,
                        network = %option.network,
                        "No facilitator supports payment option; skipping"
                    );
                    continue;
                }
            };
            let price = option.price.resolve();
            let parsed = handler.parse_price(&price, &option.network)?;
            let base = PaymentRequirements {
                scheme: option.scheme.clone(),
                network: option.network.clone(),
                asset: parsed.asset,
                amount: parsed.amount,
                pay_to: option.pay_to.resolve(),
                max_timeout_seconds: option
                    .max_timeout_seconds
                    .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
                extra: parsed.extra.unwrap_or_default(),
            };
            let enhanced = handler.enhance_payment_requirements(
                base,
                &entry.kind,
                &entry.facilitator_extensions,
            )?;
            enhanced.validate()?;
            requirements.push(enhanced);
        }
        Ok(requirements)
    }

    /// Builds a V2 402 body and applies payment-required enrichment.
    pub fn create_payment_required_response(
        &self,
        requirements: Vec<PaymentRequirements>,
        resource: ResourceInfo,
        error: Option<String>,
        declarations: Option<&Extensions>,
    ) -> v2::PaymentRequired {
        let mut response = v2::PaymentRequired {
            x402_version: v2::X402Version2,
            resource,
            accepts: requirements,
            error,
            extensions: declarations.cloned(),
        };
        let updates = {
            let context = PaymentRequiredContext {
                response: &response,
                requirements: &response.accepts,
            };
            self.collect_enrichment(declarations, |extension, declaration| {
                extension.enrich_payment_required_response(declaration, &context)
            })
        };
        apply_extension_updates(&mut response.extensions, updates);
        response
    }

    /// Verifies a payment through the matching facilitator, running the
    /// verify hook lifecycle. A before-hook abort produces an
    /// `isValid: false` response carrying the abort reason.
    pub async fn verify_payment(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }
        let ctx = VerifyContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };
        if let Some(abort) = self.hooks.run_before_verify(&ctx).await {
            return Ok(VerifyResponse::invalid(abort.reason));
        }

        let result = self.dispatch_verify(payload, requirements).await;
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
                Err(error.into())
            }
        }
    }

    /// Settles a payment through the matching facilitator, running the settle
    /// hook lifecycle. Unlike verification, a before-hook abort is an error:
    /// an aborted settlement is an operational exception.
    pub async fn settle_payment(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }
        let ctx = SettleContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };
        if let Some(abort) = self.hooks.run_before_settle(&ctx).await {
            return Err(ServerError::SettleAborted(abort.reason));
        }

        let result = self.dispatch_settle(payload, requirements).await;
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
                Err(error.into())
            }
        }
    }

    /// Finds the offered requirement matching the payload: deep JSON equality
    /// against `accepted` for V2 (property order never matters), scheme plus
    /// network for V1.
    pub fn find_matching_requirements<'a>(
        &self,
        available: &'a [PaymentRequirements],
        payload: &proto::PaymentPayload,
    ) -> Option<&'a PaymentRequirements> {
        match payload {
            proto::PaymentPayload::V2(p) => {
                let accepted = serde_json::to_value(&p.accepted).ok()?;
                available.iter().find(|requirement| {
                    serde_json::to_value(requirement)
                        .map(|value| value == accepted)
                        .unwrap_or(false)
                })
            }
            proto::PaymentPayload::V1(p) => available.iter().find(|requirement| {
                requirement.scheme == p.scheme && requirement.network.as_str() == p.network
            }),
        }
    }

    /// Orchestrates one paid request: build requirements, match the payload,
    /// verify, and report what the transport should do next.
    pub async fn process_payment_request(
        &self,
        payload: Option<&proto::PaymentPayload>,
        config: &RouteConfig,
        resource: &ResourceInfo,
        declarations: Option<&Extensions>,
    ) -> Result<ProcessedPayment, ServerError> {
        let requirements = self.build_payment_requirements(config)?;
        let payload = match payload {
            None => {
                let response = self
                    .payment_required_with_offer(requirements, resource, None, declarations)
                    .await;
                return Ok(ProcessedPayment::Required(response));
            }
            Some(payload) => payload,
        };
        let selected = match self.find_matching_requirements(&requirements, payload) {
            Some(selected) => selected.clone(),
            None => {
                let response = self
                    .payment_required_with_offer(
                        requirements,
                        resource,
                        Some("No matching payment requirements found".to_string()),
                        declarations,
                    )
                    .await;
                return Ok(ProcessedPayment::Required(response));
            }
        };
        let verification = self.verify_payment(payload, &selected).await?;
        if !verification.is_valid {
            let error = verification
                .invalid_reason
                .clone()
                .unwrap_or_else(|| "Payment verification failed".to_string());
            let response = self
                .payment_required_with_offer(requirements, resource, Some(error), declarations)
                .await;
            return Ok(ProcessedPayment::Required(response));
        }
        let verification =
            self.apply_verification_extensions(declarations, payload, &selected, verification);
        Ok(ProcessedPayment::ReadyToDeliver {
            payload: payload.clone(),
            requirements: selected,
            verification,
        })
    }

    /// Materializes a route's extension declarations for one request, letting
    /// each registered extension add computed fields. Unknown keys pass
    /// through untouched; enrichment errors are logged and the static
    /// declaration kept.
    pub fn enrich_declarations(
        &self,
        declarations: &Extensions,
        transport_context: &Value,
    ) -> Extensions {
        let mut enriched = declarations.clone();
        for extension in &self.extensions {
            if let Some(declaration) = declarations.get(extension.key()) {
                match extension.enrich_declaration(declaration.clone(), transport_context) {
                    Ok(value) => {
                        enriched.insert(extension.key().to_string(), value);
                    }
                    Err(error) => {
                        tracing::warn!(
                            extension = %extension.key(),
                            %error,
                            "Extension declaration enrichment failed; keeping static declaration"
                        );
                    }
                }
            }
        }
        enriched
    }

    /// Applies verification enrichment. Best-effort: failures are logged.
    pub fn apply_verification_extensions(
        &self,
        declarations: Option<&Extensions>,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
        result: VerifyResponse,
    ) -> VerifyResponse {
        let updates = {
            let context = VerificationContext {
                payload,
                requirements,
                result: &result,
            };
            self.collect_enrichment(declarations, |extension, declaration| {
                extension.enrich_verification_response(declaration, &context)
            })
        };
        let mut result = result;
        apply_extension_updates(&mut result.extensions, updates);
        result
    }

    /// Applies settlement enrichment and, when configured, attaches a signed
    /// receipt. Best-effort: failures are logged and the base response kept.
    pub async fn apply_settlement_extensions(
        &self,
        declarations: Option<&Extensions>,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
        result: SettleResponse,
    ) -> SettleResponse {
        let updates = {
            let context = SettlementContext {
                payload,
                requirements,
                result: &result,
            };
            self.collect_enrichment(declarations, |extension, declaration| {
                extension.enrich_settlement_response(declaration, &context)
            })
        };
        let mut result = result;
        apply_extension_updates(&mut result.extensions, updates);

        if let (Some(config), Some(resource), Some(payer)) = (
            &self.offer_receipts,
            payload.resource(),
            result.payer.clone(),
        ) {
            match config
                .receipt_signer
                .sign_receipt(&resource.url, &payer)
                .await
            {
                Ok(envelope) => match serde_json::to_value(&envelope) {
                    Ok(value) => {
                        result
                            .extensions
                            .get_or_insert_with(Extensions::new)
                            .insert(
                                OFFER_RECEIPTS_KEY.to_string(),
                                serde_json::json!({ "receipt": value }),
                            );
                    }
                    Err(error) => {
                        tracing::warn!(%error, "Failed to serialize signed receipt");
                    }
                },
                Err(error) => {
                    tracing::warn!(%error, "Receipt signing failed; settlement reported without receipt");
                }
            }
        }
        result
    }

    async fn payment_required_with_offer(
        &self,
        requirements: Vec<PaymentRequirements>,
        resource: &ResourceInfo,
        error: Option<String>,
        declarations: Option<&Extensions>,
    ) -> v2::PaymentRequired {
        let mut response = self.create_payment_required_response(
            requirements,
            resource.clone(),
            error,
            declarations,
        );
        if let Some(config) = &self.offer_receipts {
            match config
                .offer_signer
                .sign_offer(&resource.url, &response.accepts)
                .await
            {
                Ok(envelope) => match serde_json::to_value(&envelope) {
                    Ok(value) => {
                        response
                            .extensions
                            .get_or_insert_with(Extensions::new)
                            .insert(
                                OFFER_RECEIPTS_KEY.to_string(),
                                serde_json::json!({ "offer": value }),
                            );
                    }
                    Err(error) => tracing::warn!(%error, "Failed to serialize signed offer"),
                },
                Err(error) => {
                    tracing::warn!(%error, "Offer signing failed; 402 sent without signed offer");
                }
            }
        }
        response
    }

    fn collect_enrichment<F>(
        &self,
        declarations: Option<&Extensions>,
        mut enrich: F,
    ) -> Vec<(String, Value)>
    where
        F: FnMut(&dyn ServerExtension, &Value) -> Result<Option<Value>, x402_types::extensions::ExtensionError>,
    {
        let Some(declarations) = declarations else {
            return Vec::new();
        };
        let mut updates = Vec::new();
        for extension in &self.extensions {
            let Some(declaration) = declarations.get(extension.key()) else {
                continue;
            };
            match enrich(extension.as_ref(), declaration) {
                Ok(Some(value)) => updates.push((extension.key().to_string(), value)),
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        extension = %extension.key(),
                        %error,
                        "Extension enrichment failed; base response preserved"
                    );
                }
            }
        }
        updates
    }

    async fn dispatch_verify(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        match self.route_client(payload) {
            Some(client) => client.verify(payload, requirements).await,
            None => self
                .try_all_clients(payload, |client| client.verify(payload, requirements))
                .await,
        }
    }

    async fn dispatch_settle(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        match self.route_client(payload) {
            Some(client) => client.settle(payload, requirements).await,
            None => self
                .try_all_clients(payload, |client| client.settle(payload, requirements))
                .await,
        }
    }

    fn route_client(&self, payload: &proto::PaymentPayload) -> Option<&Arc<dyn FacilitatorClient>> {
        let network = Network::from_str(payload.network()).ok()?;
        self.directory
            .lookup(payload.x402_version(), payload.scheme(), &network)
            .map(|entry| &entry.client)
    }

    /// Fallback dispatch when no directory entry matches: try every
    /// configured client in order, keeping the last error.
    async fn try_all_clients<'a, T, F, Fut>(
        &'a self,
        payload: &proto::PaymentPayload,
        mut call: F,
    ) -> Result<T, FacilitatorError>
    where
        F: FnMut(&'a Arc<dyn FacilitatorClient>) -> Fut,
        Fut: Future<Output = Result<T, FacilitatorError>>,
    {
        let mut last_error = FacilitatorError::Unsupported {
            version: payload.x402_version(),
            scheme: payload.scheme().to_string(),
            network: payload.network().to_string(),
        };
        for client in &self.facilitator_clients {
            match call(client).await {
                Ok(response) => return Ok(response),
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }
}

fn apply_extension_updates(target: &mut Option<Extensions>, updates: Vec<(String, Value)>) {
    if updates.is_empty() {
        return;
    }
    let extensions = target.get_or_insert_with(Extensions::new);
    for (key, value) in updates {
        extensions.insert(key, value);
    }
}
