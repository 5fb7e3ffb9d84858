#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport adapter for the x402 resource server.
//!
//! This crate maps the transport-neutral resource server core onto HTTP
//! without committing to a web framework: requests come in as an
//! [`HttpRequestContext`], and decisions go out as
//! [`HttpPaymentOutcome`] / [`HttpResponseInstructions`] for the embedding
//! framework to apply.
//!
//! # Modules
//!
//! - [`context`] - Request views and response instructions
//! - [`routes`] - `"METHOD /path"` route patterns with params and wildcards
//! - [`server`] - The [`HttpResourceServer`] adapter
//! - [`paywall`] - HTML paywall hook for browser traffic

pub mod context;
pub mod paywall;
pub mod routes;
pub mod server;

pub use context::{HttpRequestContext, HttpResponseInstructions};
pub use paywall::PaywallProvider;
pub use routes::{RouteConfigurationError, RoutePattern, RouteTable};
pub use server::{HttpError, HttpPaymentOutcome, HttpResourceServer};
