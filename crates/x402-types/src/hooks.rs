//! Lifecycle hooks for verify and settle operations.
//!
//! Resource servers and facilitators share the same six hook points:
//! before/after/on-failure for verification and settlement. Hooks are ordered,
//! fallible lists of async callables:
//!
//! - A *before* hook may abort the operation by returning an [`AbortResult`].
//!   A verify abort surfaces as an `isValid: false` response; a settle abort
//!   is an operational error, matching the protocol's financial semantics.
//! - An *after* hook observes the successful result.
//! - An *on-failure* hook may recover by returning a synthesized response; the
//!   first recovery wins and no further failure hooks run.
//!
//! Within one operation, hooks run strictly in registration order and never
//! overlap the operation itself.

use futures_util::future::BoxFuture;

use crate::proto::{PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};

/// Returned from a before-hook to abort the operation.
#[derive(Debug, Clone)]
pub struct AbortResult {
    pub reason: String,
}

impl AbortResult {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Returned from a verify-failure hook to recover with a synthesized result.
#[derive(Debug, Clone)]
pub struct RecoveredVerify {
    pub result: VerifyResponse,
}

/// Returned from a settle-failure hook to recover with a synthesized result.
#[derive(Debug, Clone)]
pub struct RecoveredSettle {
    pub result: SettleResponse,
}

/// Context passed to before-verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
}

/// Context passed to after-verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyResultContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
    pub result: VerifyResponse,
}

/// Context passed to verify-failure hooks.
#[derive(Debug, Clone)]
pub struct VerifyFailureContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
    pub error: String,
}

/// Context passed to before-settle hooks.
#[derive(Debug, Clone)]
pub struct SettleContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
}

/// Context passed to after-settle hooks.
#[derive(Debug, Clone)]
pub struct SettleResultContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
    pub result: SettleResponse,
}

/// Context passed to settle-failure hooks.
#[derive(Debug, Clone)]
pub struct SettleFailureContext {
    pub payload: PaymentPayload,
    pub requirements: PaymentRequirements,
    pub error: String,
}

/// Async hook called before verification. Return `Some(AbortResult)` to abort.
pub type BeforeVerifyHook =
    Box<dyn Fn(&VerifyContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful verification.
pub type AfterVerifyHook = Box<dyn Fn(&VerifyResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on verification failure. Return a recovery to override.
pub type OnVerifyFailureHook =
    Box<dyn Fn(&VerifyFailureContext) -> BoxFuture<'_, Option<RecoveredVerify>> + Send + Sync>;

/// Async hook called before settlement. Return `Some(AbortResult)` to abort.
pub type BeforeSettleHook =
    Box<dyn Fn(&SettleContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful settlement.
pub type AfterSettleHook = Box<dyn Fn(&SettleResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on settlement failure. Return a recovery to override.
pub type OnSettleFailureHook =
    Box<dyn Fn(&SettleFailureContext) -> BoxFuture<'_, Option<RecoveredSettle>> + Send + Sync>;

/// The six hook lists shared by resource servers and facilitators.
///
/// All registration happens before serving begins; the lists are read-only on
/// the request path.
#[derive(Default)]
pub struct Hooks {
    before_verify: Vec<BeforeVerifyHook>,
    after_verify: Vec<AfterVerifyHook>,
    on_verify_failure: Vec<OnVerifyFailureHook>,
    before_settle: Vec<BeforeSettleHook>,
    after_settle: Vec<AfterSettleHook>,
    on_settle_failure: Vec<OnSettleFailureHook>,
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("before_verify", &self.before_verify.len())
            .field("after_verify", &self.after_verify.len())
            .field("on_verify_failure", &self.on_verify_failure.len())
            .field("before_settle", &self.before_settle.len())
            .field("after_settle", &self.after_settle.len())
            .field("on_settle_failure", &self.on_settle_failure.len())
            .finish()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_verify(&mut self, hook: BeforeVerifyHook) -> &mut Self {
        self.before_verify.push(hook);
        self
    }

    pub fn on_after_verify(&mut self, hook: AfterVerifyHook) -> &mut Self {
        self.after_verify.push(hook);
        self
    }

    pub fn on_verify_failure(&mut self, hook: OnVerifyFailureHook) -> &mut Self {
        self.on_verify_failure.push(hook);
        self
    }

    pub fn on_before_settle(&mut self, hook: BeforeSettleHook) -> &mut Self {
        self.before_settle.push(hook);
        self
    }

    pub fn on_after_settle(&mut self, hook: AfterSettleHook) -> &mut Self {
        self.after_settle.push(hook);
        self
    }

    pub fn on_settle_failure(&mut self, hook: OnSettleFailureHook) -> &mut Self {
        self.on_settle_failure.push(hook);
        self
    }

    /// Runs before-verify hooks in order; returns the first abort, if any.
    pub async fn run_before_verify(&self, ctx: &VerifyContext) -> Option<AbortResult> {
        for hook in &self.before_verify {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    /// Runs after-verify hooks in order.
    pub async fn run_after_verify(&self, ctx: &VerifyResultContext) {
        for hook in &self.after_verify {
            hook(ctx).await;
        }
    }

    /// Runs verify-failure hooks in order; the first recovery wins.
    pub async fn run_verify_failure(&self, ctx: &VerifyFailureContext) -> Option<RecoveredVerify> {
        for hook in &self.on_verify_failure {
            if let Some(recovered) = hook(ctx).await {
                return Some(recovered);
            }
        }
        None
    }

    /// Runs before-settle hooks in order; returns the first abort, if any.
    pub async fn run_before_settle(&self, ctx: &SettleContext) -> Option<AbortResult> {
        for hook in &self.before_settle {
            if let Some(abort) = hook(ctx).await {
                return Some(abort);
            }
        }
        None
    }

    /// Runs after-settle hooks in order.
    pub async fn run_after_settle(&self, ctx: &SettleResultContext) {
        for hook in &self.after_settle {
            hook(ctx).await;
        }
    }

    /// Runs settle-failure hooks in order; the first recovery wins.
    pub async fn run_settle_failure(&self, ctx: &SettleFailureContext) -> Option<RecoveredSettle> {
        for hook in &self.on_settle_failure {
            if let Some(recovered) = hook(ctx).await {
                return Some(recovered);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::v1;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn payload() -> PaymentPayload {
        PaymentPayload::V1(v1::PaymentPayload {
            x402_version: v1::X402Version1,
            scheme: "exact".to_string(),
            network: "eip155:8453".to_string(),
            payload: json!({}),
        })
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: "eip155:8453".parse().unwrap(),
            asset: "USD".to_string(),
            amount: "1".to_string(),
            pay_to: "Alice".to_string(),
            max_timeout_seconds: 300,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_before_hooks_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        for tag in ["first", "second", "third"] {
            let order = order.clone();
            hooks.on_before_verify(Box::new(move |_| {
                let order = order.clone();
                Box::pin(async move {
                    order.lock().unwrap().push(tag);
                    None
                })
            }));
        }
        let ctx = VerifyContext {
            payload: payload(),
            requirements: requirements(),
        };
        assert!(hooks.run_before_verify(&ctx).await.is_none());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_abort_stops_iteration() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = Hooks::new();
        {
            let seen = seen.clone();
            hooks.on_before_verify(Box::new(move |_| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push("aborting");
                    Some(AbortResult::new("rate limited"))
                })
            }));
        }
        {
            let seen = seen.clone();
            hooks.on_before_verify(Box::new(move |_| {
                let seen = seen.clone();
                Box::pin(async move {
                    seen.lock().unwrap().push("unreachable");
                    None
                })
            }));
        }
        let ctx = VerifyContext {
            payload: payload(),
            requirements: requirements(),
        };
        let abort = hooks.run_before_verify(&ctx).await.unwrap();
        assert_eq!(abort.reason, "rate limited");
        assert_eq!(*seen.lock().unwrap(), vec!["aborting"]);
    }

    #[tokio::test]
    async fn test_first_recovery_wins() {
        let mut hooks = Hooks::new();
        hooks.on_verify_failure(Box::new(|_| Box::pin(async { None })));
        hooks.on_verify_failure(Box::new(|_| {
            Box::pin(async {
                Some(RecoveredVerify {
                    result: VerifyResponse::valid("recovered-payer"),
                })
            })
        }));
        let reached_third = Arc::new(Mutex::new(false));
        {
            let reached_third = reached_third.clone();
            hooks.on_verify_failure(Box::new(move |_| {
                let reached_third = reached_third.clone();
                Box::pin(async move {
                    *reached_third.lock().unwrap() = true;
                    None
                })
            }));
        }
        let ctx = VerifyFailureContext {
            payload: payload(),
            requirements: requirements(),
            error: "boom".to_string(),
        };
        let recovered = hooks.run_verify_failure(&ctx).await.unwrap();
        assert_eq!(recovered.result.payer.as_deref(), Some("recovered-payer"));
        assert!(!*reached_third.lock().unwrap());
    }
}
