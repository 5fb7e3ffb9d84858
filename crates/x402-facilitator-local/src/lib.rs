#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! In-process facilitator for the x402 payment protocol.
//!
//! This crate provides [`FacilitatorLocal`], a
//! [`FacilitatorClient`](x402_types::facilitator::FacilitatorClient)
//! implementation that verifies and settles payments through
//! [`SchemeNetworkFacilitator`](x402_types::scheme::SchemeNetworkFacilitator)
//! handlers registered in its own scheme registry, runs the full verify and
//! settle hook lifecycle, and expands wildcard registrations into concrete
//! supported kinds.
//!
//! # Example
//!
//! ```ignore
//! use x402_facilitator_local::FacilitatorLocal;
//! use std::sync::Arc;
//!
//! let mut facilitator = FacilitatorLocal::new();
//! facilitator.register("eip155:*".parse()?, Arc::new(MyExactScheme::new(signer)));
//! facilitator.advertise_network("eip155:8453".parse()?);
//!
//! // Embed directly in a resource server, or serve over HTTP with the
//! // handlers from the `x402-protocol` crate.
//! let supported = facilitator.build_supported(&["eip155:8453".parse()?]);
//! ```

pub mod facilitator_local;

pub use facilitator_local::FacilitatorLocal;
