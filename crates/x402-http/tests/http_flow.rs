//! HTTP adapter flow tests: a cash scheme served by an in-process
//! facilitator, driven through the transport-neutral request context.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use x402_facilitator_local::FacilitatorLocal;
use x402_http::context::HttpRequestContext;
use x402_http::server::{HttpPaymentOutcome, HttpResourceServer};
use x402_server::config::{PaymentOption, RouteConfig};
use x402_server::server::X402ResourceServer;
use x402_types::facilitator::FacilitatorError;
use x402_types::headers;
use x402_types::intent::IntentTrace;
use x402_types::network::Network;
use x402_types::proto::{
    self, PaymentRequirements, SettleResponse, VerifyResponse, v2,
};
use x402_types::scheme::{
    AssetAmount, Price, SchemeError, SchemeNetworkFacilitator, SchemeNetworkServer,
};
use x402_types::util::MoneyAmount;

const CASH_NETWORK: &str = "x402:cash";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

/// Server-side cash scheme: dollar prices become whole USD units.
struct CashServer;

impl SchemeNetworkServer for CashServer {
    fn scheme(&self) -> &str {
        "cash"
    }

    fn parse_price(&self, price: &Price, _network: &Network) -> Result<AssetAmount, SchemeError> {
        match price {
            Price::Money(money) => {
                let amount = MoneyAmount::parse(money)
                    .and_then(|m| m.as_minor_units(0))
                    .map_err(|e| SchemeError::InvalidPrice(e.to_string()))?;
                Ok(AssetAmount {
                    amount,
                    asset: "USD".to_string(),
                    extra: None,
                })
            }
            Price::Asset(asset) => Ok(asset.clone()),
        }
    }
}

/// Facilitator-side cash scheme: a payment is a promise signed `~name`.
struct CashFacilitator;

#[async_trait]
impl SchemeNetworkFacilitator for CashFacilitator {
    fn scheme(&self) -> &str {
        "cash"
    }

    async fn verify(
        &self,
        payload: &proto::PaymentPayload,
        _requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        let inner = payload.inner_payload();
        let name = inner.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let signature = inner
            .get("signature")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let valid_until = inner
            .get("validUntil")
            .and_then(|v| v.as_u64())
            .unwrap_or_default();
        if valid_until <= now_secs() {
            return Ok(VerifyResponse::invalid_with_trace(
                "expired_signature",
                IntentTrace::signature_expired(valid_until),
            ));
        }
        if signature != format!("~{name}") {
            return Ok(VerifyResponse::invalid_with_trace(
                "invalid_signature",
                IntentTrace::signature_invalid(),
            ));
        }
        Ok(VerifyResponse::valid(signature))
    }

    async fn settle(
        &self,
        payload: &proto::PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        let inner = payload.inner_payload();
        let name = inner.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        if name == "Mallory" {
            return Ok(SettleResponse::error_with_trace(
                "insufficient_funds",
                requirements.network.to_string(),
                IntentTrace::insufficient_funds(&requirements.amount),
            ));
        }
        Ok(SettleResponse::success(
            format!(
                "{name} transferred {} {} to {}",
                requirements.amount, requirements.asset, requirements.pay_to
            ),
            requirements.network.to_string(),
            format!("~{name}"),
        ))
    }
}

async fn paid_report_server() -> HttpResourceServer {
    let mut facilitator = FacilitatorLocal::new();
    facilitator.register(CASH_NETWORK.parse().unwrap(), Arc::new(CashFacilitator));

    let mut inner = X402ResourceServer::with_facilitator(Arc::new(facilitator));
    inner.register(CASH_NETWORK.parse().unwrap(), Arc::new(CashServer));

    let route = RouteConfig::new(PaymentOption::new(
        "cash",
        CASH_NETWORK.parse().unwrap(),
        "Alice".to_string(),
        Price::from("$1"),
    ))
    .with_description("Weather report")
    .with_mime_type("application/json");

    let mut server = HttpResourceServer::new(
        inner,
        vec![
            ("GET /report".to_string(), route),
            ("GET /misconfigured".to_string(), RouteConfig::default()),
        ],
    )
    .unwrap();
    server.initialize().await.unwrap();
    server
}

fn report_request() -> HttpRequestContext {
    HttpRequestContext::new("GET", "/report", "https://api.example.com/report")
}

fn cash_payload(name: &str, valid_until: u64, accepted: PaymentRequirements) -> proto::PaymentPayload {
    proto::PaymentPayload::V2(v2::PaymentPayload {
        x402_version: v2::X402Version2,
        resource: v2::ResourceInfo {
            url: "https://api.example.com/report".to_string(),
            description: "Weather report".to_string(),
            mime_type: "application/json".to_string(),
        },
        accepted,
        payload: json!({
            "signature": format!("~{name}"),
            "name": name,
            "validUntil": valid_until,
        }),
        extensions: None,
    })
}

/// Fetches the 402 and returns its offered requirements.
async fn offered_requirements(server: &HttpResourceServer) -> Vec<PaymentRequirements> {
    match server.handle_request(&report_request()).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 402);
            let header = response.header("PAYMENT-REQUIRED").unwrap();
            headers::decode_payment_required_header(header).unwrap().accepts
        }
        other => panic!("expected 402, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_payment_yields_402_with_decodable_offer() {
    let server = paid_report_server().await;
    let accepts = offered_requirements(&server).await;
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0].scheme, "cash");
    assert_eq!(accepts[0].amount, "1");
    assert_eq!(accepts[0].asset, "USD");
    assert_eq!(accepts[0].pay_to, "Alice");
    assert_eq!(accepts[0].network.as_str(), CASH_NETWORK);
    assert_eq!(accepts[0].max_timeout_seconds, 300);
}

#[tokio::test]
async fn unmatched_path_passes_through() {
    let server = paid_report_server().await;
    let ctx = HttpRequestContext::new("GET", "/public", "https://api.example.com/public");
    assert!(matches!(
        server.handle_request(&ctx).await.unwrap(),
        HttpPaymentOutcome::Unprotected
    ));
}

#[tokio::test]
async fn malformed_header_is_400_not_402() {
    let server = paid_report_server().await;
    let ctx = report_request().with_header("PAYMENT-SIGNATURE", "invalid@#$%");
    match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 400);
            let body = response.body.unwrap();
            assert!(body.contains("Invalid payment header format: not valid base64"));
        }
        other => panic!("expected 400, got {other:?}"),
    }
}

#[tokio::test]
async fn happy_path_verifies_then_settles() {
    let server = paid_report_server().await;
    let accepts = offered_requirements(&server).await;

    let payload = cash_payload("John", now_secs() + 1000, accepts[0].clone());
    let encoded = headers::encode_payment_signature_header(&payload).unwrap();
    let ctx = report_request().with_header("PAYMENT-SIGNATURE", encoded);

    let (payload, requirements, declarations) = match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentVerified {
            payload,
            requirements,
            verification,
            declarations,
        } => {
            assert!(verification.is_valid);
            assert_eq!(verification.payer.as_deref(), Some("~John"));
            (payload, requirements, declarations)
        }
        other => panic!("expected verified payment, got {other:?}"),
    };

    // Deliver, then settle; the settlement rides back as a response header.
    let instructions = server
        .process_settlement(&payload, &requirements, declarations.as_ref())
        .await
        .unwrap();
    let header = instructions.header("PAYMENT-RESPONSE").unwrap();
    let envelope = headers::decode_payment_response_header(header).unwrap();
    assert!(envelope.settlement.success);
    assert_eq!(
        envelope.settlement.transaction,
        "John transferred 1 USD to Alice"
    );
    assert_eq!(envelope.settlement.network, CASH_NETWORK);
    assert_eq!(envelope.settlement.payer.as_deref(), Some("~John"));
    assert_eq!(envelope.requirements, requirements);
}

#[tokio::test]
async fn expired_signature_surfaces_as_402_with_reason() {
    let server = paid_report_server().await;
    let accepts = offered_requirements(&server).await;

    let payload = cash_payload("John", 0, accepts[0].clone());
    let encoded = headers::encode_payment_signature_header(&payload).unwrap();
    let ctx = report_request().with_header("PAYMENT-SIGNATURE", encoded);
    match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 402);
            let header = response.header("PAYMENT-REQUIRED").unwrap();
            let decoded = headers::decode_payment_required_header(header).unwrap();
            assert_eq!(decoded.error.as_deref(), Some("expired_signature"));
        }
        other => panic!("expected 402, got {other:?}"),
    }
}

#[tokio::test]
async fn settlement_failure_still_reports_via_header() {
    let server = paid_report_server().await;
    let accepts = offered_requirements(&server).await;

    let payload = cash_payload("Mallory", now_secs() + 1000, accepts[0].clone());
    let encoded = headers::encode_payment_signature_header(&payload).unwrap();
    let ctx = report_request().with_header("PAYMENT-SIGNATURE", encoded);
    let (payload, requirements) = match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentVerified {
            payload,
            requirements,
            ..
        } => (payload, requirements),
        other => panic!("expected verified payment, got {other:?}"),
    };

    // Settlement fails at the business level: the body was already served,
    // so the failure is reported through the header, not an error.
    let instructions = server
        .process_settlement(&payload, &requirements, None)
        .await
        .unwrap();
    let envelope = headers::decode_payment_response_header(
        instructions.header("PAYMENT-RESPONSE").unwrap(),
    )
    .unwrap();
    assert!(!envelope.settlement.success);
    assert_eq!(
        envelope.settlement.error_reason.as_deref(),
        Some("insufficient_funds")
    );
    assert_eq!(
        envelope.settlement.intent_trace.unwrap().reason_code,
        x402_types::intent::ReasonCode::InsufficientFunds
    );
}

#[tokio::test]
async fn decline_header_is_reported_as_declined() {
    let server = paid_report_server().await;
    let decline = v2::PaymentDecline::new(
        v2::ResourceInfo {
            url: "https://api.example.com/report".to_string(),
            description: "Weather report".to_string(),
            mime_type: "application/json".to_string(),
        },
        Some(IntentTrace::insufficient_funds("1")),
    );
    let encoded = headers::encode_payment_decline_header(&decline).unwrap();
    let ctx = report_request().with_header("PAYMENT-SIGNATURE", encoded);
    match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentDeclined { decline } => {
            assert!(decline.decline);
            assert_eq!(
                decline.intent_trace.unwrap().reason_code,
                x402_types::intent::ReasonCode::InsufficientFunds
            );
        }
        other => panic!("expected decline, got {other:?}"),
    }
}

#[tokio::test]
async fn browser_gets_paywall_html() {
    let server = paid_report_server().await;
    let server = server.with_paywall(Arc::new(
        |required: &v2::PaymentRequired, _ctx: &HttpRequestContext| {
            format!("<html><body>Pay for {}</body></html>", required.resource.url)
        },
    ));
    let ctx = report_request()
        .with_header("Accept", "text/html,application/xhtml+xml")
        .with_header("User-Agent", "Mozilla/5.0 (X11; Linux x86_64)");
    match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 402);
            assert!(response.header("PAYMENT-REQUIRED").is_some());
            let body = response.body.unwrap();
            assert!(body.starts_with("<html>"));
            assert!(body.contains("https://api.example.com/report"));
        }
        other => panic!("expected 402, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_offer_list_is_a_configuration_failure_not_a_402() {
    let server = paid_report_server().await;
    let ctx = HttpRequestContext::new(
        "GET",
        "/misconfigured",
        "https://api.example.com/misconfigured",
    );
    match server.handle_request(&ctx).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 500);
            assert!(response.header("PAYMENT-REQUIRED").is_none());
        }
        other => panic!("expected configuration failure, got {other:?}"),
    }
}
