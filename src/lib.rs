//! Reference implementation of the [x402 protocol](https://www.x402.org) core.
//!
//! The x402 protocol turns HTTP `402 Payment Required` into a generic payment
//! handshake between three roles:
//!
//! - a **resource server** guarding paid resources,
//! - a **client** that selects a payment requirement, signs a payment, and
//!   retries,
//! - a **facilitator** that verifies and settles payments on the server's
//!   behalf.
//!
//! This crate is the umbrella over the workspace:
//!
//! - [`types`] ([`x402_types`]) — wire formats, networks, scheme registry,
//!   hooks, intent traces, header codecs.
//! - [`server`] ([`x402_server`]) — the resource server core and the HTTP
//!   facilitator client.
//! - [`http`] ([`x402_http`]) — the transport-neutral HTTP adapter (headers,
//!   status codes, route patterns, paywalls).
//! - [`client`] ([`x402_client`]) — the payment client and a reqwest
//!   middleware for transparent 402 handling.
//! - [`facilitator_local`] ([`x402_facilitator_local`]) — an in-process
//!   facilitator backed by registered scheme handlers.
//! - [`handlers`] / [`service`] — the facilitator's own HTTP surface
//!   (`POST /verify`, `POST /settle`, `GET /supported`) as an embeddable
//!   axum router, with CORS and graceful shutdown.
//!
//! Chain-specific signing, settlement backends, and wallet UI are external
//! collaborators: they plug in through the scheme handler traits in
//! [`types::scheme`](x402_types::scheme).

pub use x402_client as client;
pub use x402_facilitator_local as facilitator_local;
pub use x402_http as http;
pub use x402_server as server;
pub use x402_types as types;

pub mod config;
pub mod handlers;
pub mod service;
