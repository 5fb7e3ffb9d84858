#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! The x402 resource server core.
//!
//! A resource server guards paid resources. This crate provides the
//! transport-neutral half of that job:
//!
//! - [`server::X402ResourceServer`] — requirement building, facilitator
//!   dispatch, verify/settle orchestration with lifecycle hooks.
//! - [`config`] — route and payment option configuration, with static or
//!   per-request (`ValueOrFn`) values.
//! - [`extensions`] — best-effort response enrichers.
//! - [`receipts`] — opaque offer/receipt signing capability.
//! - [`facilitator_http`] — a [`FacilitatorClient`](x402_types::facilitator::FacilitatorClient)
//!   over HTTP (`POST /verify`, `POST /settle`, `GET /supported`).
//!
//! HTTP transport mapping (headers, status codes, route patterns) lives in
//! the `x402-http` crate.

pub mod config;
pub mod extensions;
pub mod facilitator_http;
pub mod receipts;
pub mod server;

pub use config::{PaymentOption, RouteConfig, ValueOrFn};
pub use facilitator_http::HttpFacilitatorClient;
pub use server::{ProcessedPayment, ServerError, X402ResourceServer};
