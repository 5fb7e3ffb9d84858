#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Client-side x402 payment handling.
//!
//! This crate covers the paying side of the protocol:
//!
//! - [`client::X402PaymentsClient`] — scheme-client registry, requirement
//!   selection, payload creation, client extensions, and declines.
//! - [`middleware::X402Payments`] — a `reqwest` middleware that answers 402
//!   responses with a signed payment header and retries automatically.
//!
//! # Quickstart
//!
//! ```ignore
//! use x402_client::{X402Payments, X402PaymentsClient};
//! use reqwest_middleware::ClientBuilder;
//! use std::sync::Arc;
//!
//! let payments = X402PaymentsClient::new()
//!     .register("eip155:*".parse()?, Arc::new(MyExactSchemeClient::new(signer)));
//!
//! let http = ClientBuilder::new(reqwest::Client::new())
//!     .with(X402Payments::new(payments))
//!     .build();
//!
//! // 402 responses are paid and retried transparently.
//! let response = http.get("https://api.example.com/protected").send().await?;
//! ```

pub mod client;
pub mod middleware;

pub use client::{
    ClientError, ClientExtension, FirstSupported, RequirementsSelector, X402PaymentsClient,
};
pub use middleware::{X402Payments, parse_payment_required, settlement_from_response};
