//! The HTTP resource server adapter.
//!
//! [`HttpResourceServer`] layers HTTP semantics over
//! [`X402ResourceServer`]: it matches requests against the protected route
//! table, reads and writes the x402 wire headers, and tells the embedding
//! framework what to do next via [`HttpPaymentOutcome`].
//!
//! The payment flow per request:
//!
//! 1. No payment header → 402 with `PAYMENT-REQUIRED` (and a paywall body
//!    for browsers).
//! 2. Malformed payment header → 400 with the codec's named error.
//! 3. Explicit decline → [`HttpPaymentOutcome::PaymentDeclined`].
//! 4. Verified payment → [`HttpPaymentOutcome::PaymentVerified`]; the caller
//!    runs the protected handler, then calls
//!    [`HttpResourceServer::process_settlement`] and merges the returned
//!    headers. Settlement strictly happens after delivery: service rendered,
//!    the settlement header reports success or failure either way.

use std::sync::Arc;

use serde_json::json;

use x402_server::server::{ProcessedPayment, ServerError, X402ResourceServer};
use x402_types::headers::{
    self, HeaderCodecError, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER,
    PAYMENT_SIGNATURE_HEADER, PaymentHeader, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER,
};
use x402_types::proto::{self, Extensions, PaymentRequirements, ResourceInfo, v2};

use crate::context::{HttpRequestContext, HttpResponseInstructions};
use crate::paywall::PaywallProvider;
use crate::routes::{RouteConfigurationError, RouteTable};

const DEFAULT_MIME_TYPE: &str = "application/json";

/// Errors raised by the HTTP adapter itself (not by bad client input, which
/// surfaces as a 400-class [`HttpPaymentOutcome::PaymentError`]).
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Codec(#[from] HeaderCodecError),
    #[error(transparent)]
    Routes(#[from] RouteConfigurationError),
}

/// What the embedding framework should do with a request.
#[derive(Debug)]
pub enum HttpPaymentOutcome {
    /// The request does not hit a protected route; pass it through.
    Unprotected,
    /// Answer with these instructions (402 payment required, 400 malformed
    /// header, or a configuration failure).
    PaymentError { response: HttpResponseInstructions },
    /// Payment verified: run the protected handler, then settle.
    PaymentVerified {
        payload: proto::PaymentPayload,
        requirements: PaymentRequirements,
        verification: proto::VerifyResponse,
        /// Enriched extension declarations for this route and request; hand
        /// them back to [`HttpResourceServer::process_settlement`].
        declarations: Option<Extensions>,
    },
    /// The client explicitly declined to pay.
    PaymentDeclined { decline: v2::PaymentDecline },
}

/// HTTP adapter over the resource server core.
pub struct HttpResourceServer {
    inner: X402ResourceServer,
    routes: RouteTable,
    paywall: Option<Arc<dyn PaywallProvider>>,
    initialized: bool,
}

impl HttpResourceServer {
    /// Builds the adapter from a configured core server and a route table
    /// keyed as `"METHOD /path"`.
    pub fn new(
        inner: X402ResourceServer,
        routes: Vec<(String, x402_server::RouteConfig)>,
    ) -> Result<Self, HttpError> {
        let routes = RouteTable::try_new(routes)?;
        Ok(Self {
            inner,
            routes,
            paywall: None,
            initialized: false,
        })
    }

    pub fn with_paywall(mut self, paywall: Arc<dyn PaywallProvider>) -> Self {
        self.paywall = Some(paywall);
        self
    }

    /// Initializes the underlying resource server and validates every route
    /// against it. Must complete before requests are served.
    pub async fn initialize(&mut self) -> Result<(), HttpError> {
        let configs = self.routes.configs();
        self.inner.initialize(&configs).await?;
        self.initialized = true;
        Ok(())
    }

    pub fn inner(&self) -> &X402ResourceServer {
        &self.inner
    }

    /// Processes one incoming request up to (but not including) delivery.
    pub async fn handle_request(
        &self,
        ctx: &HttpRequestContext,
    ) -> Result<HttpPaymentOutcome, HttpError> {
        if !self.initialized {
            return Err(HttpError::Server(ServerError::NotInitialized));
        }
        let Some((_, config, _)) = self.routes.find(ctx.method(), ctx.path()) else {
            return Ok(HttpPaymentOutcome::Unprotected);
        };

        let resource = ResourceInfo {
            url: ctx.url().to_string(),
            description: config.description.clone().unwrap_or_default(),
            mime_type: config
                .mime_type
                .clone()
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        };
        let declarations = config.extensions.as_ref().map(|declarations| {
            self.inner
                .enrich_declarations(declarations, &ctx.transport_context())
        });

        let raw_header = ctx
            .header(PAYMENT_SIGNATURE_HEADER)
            .or_else(|| ctx.header(X_PAYMENT_HEADER));
        let payload = match raw_header {
            None => None,
            Some(raw) => match headers::decode_payment_header(raw) {
                Ok(PaymentHeader::Payload(payload)) => Some(payload),
                Ok(PaymentHeader::Decline(decline)) => {
                    return Ok(HttpPaymentOutcome::PaymentDeclined { decline });
                }
                Err(error) => {
                    // Malformed header: a 400-class outcome, not a 402.
                    tracing::debug!(%error, "Rejecting malformed payment header");
                    let response = HttpResponseInstructions::new(400).with_body(
                        DEFAULT_MIME_TYPE,
                        json!({ "error": error.to_string() }).to_string(),
                    );
                    return Ok(HttpPaymentOutcome::PaymentError { response });
                }
            },
        };

        let processed = self
            .inner
            .process_payment_request(payload.as_ref(), config, &resource, declarations.as_ref())
            .await?;
        match processed {
            ProcessedPayment::Required(payment_required) => {
                let response = self.payment_required_instructions(ctx, payment_required)?;
                Ok(HttpPaymentOutcome::PaymentError { response })
            }
            ProcessedPayment::ReadyToDeliver {
                payload,
                requirements,
                verification,
            } => Ok(HttpPaymentOutcome::PaymentVerified {
                payload,
                requirements,
                verification,
                declarations,
            }),
        }
    }

    /// Settles a verified payment after the protected handler ran, returning
    /// the settlement header to merge into the response.
    ///
    /// A business-level settlement failure still yields instructions: the
    /// body was already delivered, and the header carries the failure with
    /// its intent trace. Extension enrichment of the settlement response is
    /// best-effort.
    pub async fn process_settlement(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
        declarations: Option<&Extensions>,
    ) -> Result<HttpResponseInstructions, HttpError> {
        let settlement = self.inner.settle_payment(payload, requirements).await?;
        let settlement = self
            .inner
            .apply_settlement_extensions(declarations, payload, requirements, settlement)
            .await;
        let header_value = headers::encode_payment_response_header(&settlement, requirements)?;
        let header_name = match payload {
            proto::PaymentPayload::V1(_) => X_PAYMENT_RESPONSE_HEADER,
            proto::PaymentPayload::V2(_) => PAYMENT_RESPONSE_HEADER,
        };
        Ok(HttpResponseInstructions::new(200).with_header(header_name, header_value))
    }

    fn payment_required_instructions(
        &self,
        ctx: &HttpRequestContext,
        payment_required: v2::PaymentRequired,
    ) -> Result<HttpResponseInstructions, HttpError> {
        if payment_required.accepts.is_empty() {
            // An empty accepts list violates the wire invariant; refuse to
            // emit it and surface the misconfiguration instead.
            tracing::warn!(
                url = %payment_required.resource.url,
                "No payment requirements available for route; responding 500"
            );
            let response = HttpResponseInstructions::new(500).with_body(
                DEFAULT_MIME_TYPE,
                json!({ "error": "No payment requirements configured for this resource" })
                    .to_string(),
            );
            return Ok(response);
        }
        let header_value = headers::encode_payment_required_header(&payment_required)?;
        let mut response =
            HttpResponseInstructions::new(402).with_header(PAYMENT_REQUIRED_HEADER, header_value);
        match (&self.paywall, ctx.prefers_html()) {
            (Some(paywall), true) => {
                let html = paywall.render(&payment_required, ctx);
                response = response.with_body("text/html; charset=utf-8", html);
            }
            _ => {
                // JSON body keeps V1 body-based clients working.
                let body = serde_json::to_string(&payment_required)
                    .map_err(|e| HeaderCodecError::Schema(e.to_string()))?;
                response = response.with_body(DEFAULT_MIME_TYPE, body);
            }
        }
        Ok(response)
    }
}
