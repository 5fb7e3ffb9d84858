//! A [`FacilitatorClient`] that talks to a remote facilitator over HTTP.
//!
//! [`HttpFacilitatorClient`] posts JSON to `./verify` and `./settle` and gets
//! `./supported`, all relative to a configured base URL. It is cheap to clone
//! and shares a connection pool via `reqwest::Client`, so one instance can be
//! reused across concurrent request tasks.
//!
//! Integer-valued wire fields (amounts, timestamps) are strings on the wire,
//! so responses survive JSON parsers that cannot represent large integers.
//!
//! An optional async header factory supplies per-endpoint auth headers; it is
//! invoked before every call so short-lived tokens stay fresh.

use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use async_trait::async_trait;
use x402_types::facilitator::{FacilitatorClient, FacilitatorError};
use x402_types::proto::{
    PaymentPayload, PaymentRequirements, SettleResponse, SupportedResponse, VerifyResponse,
};

/// Default timeout for facilitator HTTP calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The facilitator endpoint a header factory is being asked to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilitatorEndpoint {
    Verify,
    Settle,
    Supported,
}

/// Async factory producing auth headers for a given endpoint.
pub type AuthHeadersFn = Arc<
    dyn Fn(FacilitatorEndpoint) -> BoxFuture<'static, Result<Vec<(String, String)>, FacilitatorError>>
        + Send
        + Sync,
>;

/// A client for a remote x402 facilitator.
#[derive(Clone)]
pub struct HttpFacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    supported_url: Url,
    client: Client,
    auth_headers: Option<AuthHeadersFn>,
    timeout: Duration,
}

impl fmt::Debug for HttpFacilitatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFacilitatorClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("auth_headers", &self.auth_headers.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorHttpRequest<'a> {
    x402_version: u8,
    payment_payload: &'a PaymentPayload,
    payment_requirements: &'a PaymentRequirements,
}

impl HttpFacilitatorClient {
    /// Constructs a client from a base URL, deriving the `./verify`,
    /// `./settle`, and `./supported` endpoint URLs.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorError> {
        let verify_url = base_url
            .join("./verify")
            .map_err(|e| FacilitatorError::Transport {
                context: "construct ./verify URL",
                message: e.to_string(),
            })?;
        let settle_url = base_url
            .join("./settle")
            .map_err(|e| FacilitatorError::Transport {
                context: "construct ./settle URL",
                message: e.to_string(),
            })?;
        let supported_url =
            base_url
                .join("./supported")
                .map_err(|e| FacilitatorError::Transport {
                    context: "construct ./supported URL",
                    message: e.to_string(),
                })?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            supported_url,
            client: Client::new(),
            auth_headers: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sets an async factory producing auth headers per endpoint.
    pub fn with_auth_headers(mut self, factory: AuthHeadersFn) -> Self {
        self.auth_headers = Some(factory);
        self
    }

    /// Overrides the default 30 s request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn endpoint_headers(
        &self,
        endpoint: FacilitatorEndpoint,
    ) -> Result<Vec<(String, String)>, FacilitatorError> {
        match &self.auth_headers {
            Some(factory) => factory(endpoint).await,
            None => Ok(Vec::new()),
        }
    }

    async fn post_json<T, R>(
        &self,
        url: &Url,
        endpoint: FacilitatorEndpoint,
        context: &'static str,
        body: &T,
    ) -> Result<R, FacilitatorError>
    where
        T: Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut request = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .json(body);
        for (name, value) in self.endpoint_headers(endpoint).await? {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport {
                context,
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::HttpStatus {
                context,
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| FacilitatorError::Codec {
                context,
                message: e.to_string(),
            })
    }

    async fn get_json<R>(
        &self,
        url: &Url,
        endpoint: FacilitatorEndpoint,
        context: &'static str,
    ) -> Result<R, FacilitatorError>
    where
        R: serde::de::DeserializeOwned,
    {
        let mut request = self.client.get(url.clone()).timeout(self.timeout);
        for (name, value) in self.endpoint_headers(endpoint).await? {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FacilitatorError::Transport {
                context,
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FacilitatorError::HttpStatus {
                context,
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<R>()
            .await
            .map_err(|e| FacilitatorError::Codec {
                context,
                message: e.to_string(),
            })
    }
}

/// Parses a string URL, normalizing trailing slashes so relative joins work.
impl TryFrom<&str> for HttpFacilitatorClient {
    type Error = FacilitatorError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_string();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorError::Transport {
            context: "parse base URL",
            message: e.to_string(),
        })?;
        HttpFacilitatorClient::try_new(url)
    }
}

#[async_trait]
impl FacilitatorClient for HttpFacilitatorClient {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let body = FacilitatorHttpRequest {
            x402_version: payload.x402_version(),
            payment_payload: payload,
            payment_requirements: requirements,
        };
        self.post_json(
            &self.verify_url,
            FacilitatorEndpoint::Verify,
            "POST /verify",
            &body,
        )
        .await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let body = FacilitatorHttpRequest {
            x402_version: payload.x402_version(),
            payment_payload: payload,
            payment_requirements: requirements,
        };
        self.post_json(
            &self.settle_url,
            FacilitatorEndpoint::Settle,
            "POST /settle",
            &body,
        )
        .await
    }

    async fn get_supported(&self) -> Result<SupportedResponse, FacilitatorError> {
        self.get_json(
            &self.supported_url,
            FacilitatorEndpoint::Supported,
            "GET /supported",
        )
        .await
    }
}
