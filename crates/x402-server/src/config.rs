//! Route and payment option configuration.
//!
//! A [`RouteConfig`] describes one protected resource: which payments it
//! accepts, how to describe the resource to payers, and which extension
//! declarations apply. `pay_to` and `price` may be static values or nullary
//! producers resolved per request; [`ValueOrFn`] normalizes both into a
//! single `resolve()` call at registration time.

use std::fmt;
use std::sync::Arc;

use x402_types::network::Network;
use x402_types::proto::Extensions;
use x402_types::scheme::Price;

/// A configuration value that is either static or computed per request.
pub enum ValueOrFn<T> {
    Value(T),
    Producer(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> ValueOrFn<T> {
    /// Evaluates the value. Static values are cloned; producers are invoked.
    pub fn resolve(&self) -> T {
        match self {
            ValueOrFn::Value(value) => value.clone(),
            ValueOrFn::Producer(producer) => producer(),
        }
    }

    pub fn producer<F>(producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        ValueOrFn::Producer(Arc::new(producer))
    }
}

impl<T> From<T> for ValueOrFn<T> {
    fn from(value: T) -> Self {
        ValueOrFn::Value(value)
    }
}

impl<T: Clone> Clone for ValueOrFn<T> {
    fn clone(&self) -> Self {
        match self {
            ValueOrFn::Value(value) => ValueOrFn::Value(value.clone()),
            ValueOrFn::Producer(producer) => ValueOrFn::Producer(producer.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueOrFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueOrFn::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ValueOrFn::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One acceptable payment mechanism for a route.
#[derive(Debug, Clone)]
pub struct PaymentOption {
    pub scheme: String,
    pub network: Network,
    pub pay_to: ValueOrFn<String>,
    pub price: ValueOrFn<Price>,
    pub max_timeout_seconds: Option<u64>,
}

impl PaymentOption {
    pub fn new(
        scheme: impl Into<String>,
        network: Network,
        pay_to: impl Into<ValueOrFn<String>>,
        price: impl Into<ValueOrFn<Price>>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            network,
            pay_to: pay_to.into(),
            price: price.into(),
            max_timeout_seconds: None,
        }
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }
}

/// Configuration of one protected route.
#[derive(Debug, Clone, Default)]
pub struct RouteConfig {
    pub accepts: Vec<PaymentOption>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    /// Declarative extension data keyed by extension key.
    pub extensions: Option<Extensions>,
}

impl RouteConfig {
    pub fn new(accepts: impl Into<Vec<PaymentOption>>) -> Self {
        Self {
            accepts: accepts.into(),
            description: None,
            mime_type: None,
            extensions: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

impl From<PaymentOption> for Vec<PaymentOption> {
    fn from(option: PaymentOption) -> Self {
        vec![option]
    }
}
