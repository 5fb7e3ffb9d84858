//! Reqwest middleware for transparent x402 payments.
//!
//! [`X402Payments`] intercepts `402 Payment Required` responses, builds a
//! payment with the wrapped [`X402PaymentsClient`], and retries the request
//! once with the payment header attached. Non-402 responses pass through
//! untouched.
//!
//! Version detection follows the wire format: a response carrying the
//! `PAYMENT-REQUIRED` header is V2; otherwise a JSON body with
//! `x402Version: 1` is V1.

use async_trait::async_trait;
use http::{Extensions as HttpExtensions, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;

use x402_types::headers::{
    self, PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER,
    PaymentResponseEnvelope, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER,
};
use x402_types::proto;

use crate::client::{ClientError, X402PaymentsClient};

impl From<ClientError> for rqm::Error {
    fn from(error: ClientError) -> Self {
        rqm::Error::Middleware(error.into())
    }
}

/// Middleware that retries 402 responses with a signed payment header.
#[derive(Clone)]
pub struct X402Payments {
    client: Arc<X402PaymentsClient>,
}

impl X402Payments {
    pub fn new(client: X402PaymentsClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &X402PaymentsClient {
        &self.client
    }

    /// Builds the payment header for a parsed 402 body.
    pub async fn build_payment_header(
        &self,
        payment_required: &proto::PaymentRequired,
    ) -> Result<(&'static str, HeaderValue), ClientError> {
        let selected = self
            .client
            .select_payment_requirements(payment_required.x402_version(), payment_required.accepts())?;
        let payload = self
            .client
            .create_payment_payload(payment_required, &selected)
            .await?;
        let encoded = headers::encode_payment_signature_header(&payload)?;
        let header_name = match payload {
            proto::PaymentPayload::V1(_) => X_PAYMENT_HEADER,
            proto::PaymentPayload::V2(_) => PAYMENT_SIGNATURE_HEADER,
        };
        let value = HeaderValue::from_str(&encoded)
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        Ok((header_name, value))
    }
}

#[async_trait]
impl rqm::Middleware for X402Payments {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut HttpExtensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        // Clone up front: the original is consumed by the first send.
        let retry_req = req.try_clone();

        let response = next.clone().run(req, extensions).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        tracing::debug!(url = %response.url(), "Received 402 Payment Required; building payment");

        let payment_required = parse_payment_required(response).await?;
        let (header_name, header_value) = self.build_payment_header(&payment_required).await?;

        let mut retry = retry_req.ok_or(ClientError::RequestNotCloneable)?;
        let request_headers = retry.headers_mut();
        request_headers.insert(header_name, header_value);
        request_headers.insert(
            "Access-Control-Expose-Headers",
            HeaderValue::from_static("PAYMENT-RESPONSE, X-PAYMENT-RESPONSE"),
        );
        next.run(retry, extensions).await
    }
}

/// Parses a 402 response into a versioned 402 body.
///
/// V2 responses carry the body base64url-encoded in the `PAYMENT-REQUIRED`
/// header; V1 responses carry it as the JSON body.
pub async fn parse_payment_required(
    response: Response,
) -> Result<proto::PaymentRequired, ClientError> {
    if let Some(header) = response.headers().get(PAYMENT_REQUIRED_HEADER) {
        let raw = header
            .to_str()
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        let decoded = headers::decode_payment_required_header(raw)?;
        return Ok(proto::PaymentRequired::V2(decoded));
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| ClientError::ParseError(e.to_string()))?;
    let required: proto::PaymentRequired = serde_json::from_slice(&body)
        .map_err(|e| ClientError::ParseError(format!("invalid 402 body: {e}")))?;
    match required.x402_version() {
        1 => Ok(required),
        other => Err(ClientError::ParseError(format!(
            "unexpected x402 version {other} in 402 body"
        ))),
    }
}

/// Extracts and decodes the settlement header from a paid response, if
/// present. Checks the V2 header first, then the V1 header.
pub fn settlement_from_response(
    response: &Response,
) -> Option<Result<PaymentResponseEnvelope, ClientError>> {
    let header = response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .or_else(|| response.headers().get(X_PAYMENT_RESPONSE_HEADER))?;
    let raw = match header.to_str() {
        Ok(raw) => raw,
        Err(e) => return Some(Err(ClientError::ParseError(e.to_string()))),
    };
    Some(
        headers::decode_payment_response_header(raw)
            .map_err(ClientError::from),
    )
}
