//! HTML paywall rendering for browser traffic.
//!
//! API clients get a bare 402 with the `PAYMENT-REQUIRED` header; browsers
//! get a human-readable paywall page as well. The page itself is supplied by
//! the embedding application through [`PaywallProvider`] — the core ships no
//! UI.

use x402_types::proto::v2;

use crate::context::HttpRequestContext;

/// Produces the HTML body served to browser user agents on a 402.
pub trait PaywallProvider: Send + Sync {
    fn render(&self, payment_required: &v2::PaymentRequired, context: &HttpRequestContext)
    -> String;
}

impl<F> PaywallProvider for F
where
    F: Fn(&v2::PaymentRequired, &HttpRequestContext) -> String + Send + Sync,
{
    fn render(
        &self,
        payment_required: &v2::PaymentRequired,
        context: &HttpRequestContext,
    ) -> String {
        self(payment_required, context)
    }
}
