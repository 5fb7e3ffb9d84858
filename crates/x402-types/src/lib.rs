#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the x402 payment protocol.
//!
//! This crate provides the foundational types shared by every x402 role —
//! resource server, client, and facilitator — for implementing HTTP 402
//! Payment Required flows. It is scheme- and chain-agnostic: payment
//! mechanics live in plug-in handlers registered through the scheme system.
//!
//! # Overview
//!
//! When a client requests a paid resource, the resource server responds with
//! payment requirements (HTTP 402). The client signs a payment payload, which
//! the server verifies and settles through a facilitator. This crate defines
//! the wire formats and the registries, hooks, and traits that connect the
//! three roles.
//!
//! # Modules
//!
//! - [`network`] - CAIP-2 network identifiers and wildcard patterns
//! - [`proto`] - Wire format types for protocol versions 1 and 2
//! - [`headers`] - Base64url JSON header encoding with a named error surface
//! - [`intent`] - Structured failure diagnostics (intent traces)
//! - [`scheme`] - Payment scheme capability traits and the scheme registry
//! - [`facilitator`] - The [`FacilitatorClient`](facilitator::FacilitatorClient) trait
//! - [`hooks`] - Before/after/failure lifecycle hooks for verify and settle
//! - [`extensions`] - Shared extension-system pieces
//! - [`util`] - Money-amount parsing helpers
//!
//! # Protocol Versions
//!
//! - **V1** ([`proto::v1`]): body-carried 402s, scheme and network at the
//!   payload top level, requirements matched by `(scheme, network)`.
//! - **V2** ([`proto::v2`]): header-carried 402s, explicit resource info,
//!   requirements matched by deep equality of the echoed `accepted` object.

pub mod extensions;
pub mod facilitator;
pub mod headers;
pub mod hooks;
pub mod intent;
pub mod network;
pub mod proto;
pub mod scheme;
pub mod util;
