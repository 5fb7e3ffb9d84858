//! End-to-end protocol flow: resource server, client, and in-process
//! facilitator composed through the public APIs of the workspace crates.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use x402_protocol::client::X402PaymentsClient;
use x402_protocol::facilitator_local::FacilitatorLocal;
use x402_protocol::http::context::HttpRequestContext;
use x402_protocol::http::server::{HttpPaymentOutcome, HttpResourceServer};
use x402_protocol::server::config::{PaymentOption, RouteConfig};
use x402_protocol::server::server::X402ResourceServer;
use x402_protocol::types::facilitator::{FacilitatorClient, FacilitatorError};
use x402_protocol::types::headers;
use x402_protocol::types::intent::{IntentTrace, ReasonCode};
use x402_protocol::types::network::Network;
use x402_protocol::types::proto::{
    self, PaymentRequirements, ResourceInfo, SettleResponse, VerifyResponse, v2,
};
use x402_protocol::types::scheme::{
    AssetAmount, Price, SchemeError, SchemeNetworkClient, SchemeNetworkFacilitator,
    SchemeNetworkServer,
};
use x402_protocol::types::util::MoneyAmount;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs()
}

/// The cash scheme, all three capabilities in one fixture module.
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

struct CashClient {
    payer: String,
}

#[async_trait]
impl SchemeNetworkClient for CashClient {
    fn scheme(&self) -> &str {
        "cash"
    }

    async fn create_payment_payload(
        &self,
        _requirements: &PaymentRequirements,
        _resource: Option<&ResourceInfo>,
    ) -> Result<serde_json::Value, SchemeError> {
        Ok(json!({
            "signature": format!("~{}", self.payer),
            "name": self.payer,
            "validUntil": now_secs() + 1000,
        }))
    }
}

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

async fn cash_resource_server() -> HttpResourceServer {
    let mut facilitator = FacilitatorLocal::new();
    facilitator.register("x402:cash".parse().unwrap(), Arc::new(CashFacilitator));

    let mut inner = X402ResourceServer::with_facilitator(Arc::new(facilitator));
    inner.register("x402:cash".parse().unwrap(), Arc::new(CashServer));

    let route = RouteConfig::new(PaymentOption::new(
        "cash",
        "x402:cash".parse().unwrap(),
        "Alice".to_string(),
        Price::from("$1"),
    ))
    .with_description("Weather report");

    let mut server =
        HttpResourceServer::new(inner, vec![("GET /report".to_string(), route)]).unwrap();
    server.initialize().await.unwrap();
    server
}

#[tokio::test]
async fn cash_happy_path_end_to_end() {
    let server = cash_resource_server().await;
    let request = HttpRequestContext::new("GET", "/report", "https://api.example.com/report");

    // First attempt: no payment, the server challenges with a 402.
    let challenge = match server.handle_request(&request).await.unwrap() {
        HttpPaymentOutcome::PaymentError { response } => {
            assert_eq!(response.status, 402);
            headers::decode_payment_required_header(response.header("PAYMENT-REQUIRED").unwrap())
                .unwrap()
        }
        other => panic!("expected 402 challenge, got {other:?}"),
    };
    assert_eq!(challenge.accepts.len(), 1);
    assert_eq!(challenge.accepts[0].amount, "1");
    assert_eq!(challenge.accepts[0].asset, "USD");
    assert_eq!(challenge.accepts[0].pay_to, "Alice");

    // The client selects a supported requirement and signs a payment.
    let payments = X402PaymentsClient::new().register(
        "x402:cash".parse().unwrap(),
        Arc::new(CashClient {
            payer: "John".to_string(),
        }),
    );
    let payment_required = proto::PaymentRequired::V2(challenge);
    let selected = payments
        .select_payment_requirements(2, payment_required.accepts())
        .unwrap();
    let payload = payments
        .create_payment_payload(&payment_required, &selected)
        .await
        .unwrap();
    let encoded = headers::encode_payment_signature_header(&payload).unwrap();

    // Second attempt: the payment verifies and the resource is delivered.
    let paid_request = HttpRequestContext::new("GET", "/report", "https://api.example.com/report")
        .with_header("PAYMENT-SIGNATURE", encoded);
    let (payload, requirements) = match server.handle_request(&paid_request).await.unwrap() {
        HttpPaymentOutcome::PaymentVerified {
            payload,
            requirements,
            verification,
            ..
        } => {
            assert!(verification.is_valid);
            assert_eq!(verification.payer.as_deref(), Some("~John"));
            (payload, requirements)
        }
        other => panic!("expected verified payment, got {other:?}"),
    };

    // Settlement confirms through the response header.
    let instructions = server
        .process_settlement(&payload, &requirements, None)
        .await
        .unwrap();
    let envelope = headers::decode_payment_response_header(
        instructions.header("PAYMENT-RESPONSE").unwrap(),
    )
    .unwrap();
    assert!(envelope.settlement.success);
    assert_eq!(
        envelope.settlement.transaction,
        "John transferred 1 USD to Alice"
    );
    assert_eq!(envelope.settlement.network, "x402:cash");
}

#[tokio::test]
async fn expired_authorization_carries_intent_trace() {
    let mut facilitator = FacilitatorLocal::new();
    facilitator.register("x402:cash".parse().unwrap(), Arc::new(CashFacilitator));

    let requirements = PaymentRequirements {
        scheme: "cash".to_string(),
        network: "x402:cash".parse().unwrap(),
        asset: "USD".to_string(),
        amount: "1".to_string(),
        pay_to: "Alice".to_string(),
        max_timeout_seconds: 300,
        extra: serde_json::Map::new(),
    };
    let payload = proto::PaymentPayload::V2(v2::PaymentPayload {
        x402_version: v2::X402Version2,
        resource: ResourceInfo {
            url: "https://api.example.com/report".to_string(),
            description: String::new(),
            mime_type: "application/json".to_string(),
        },
        accepted: requirements.clone(),
        payload: json!({ "signature": "~John", "name": "John", "validUntil": 0 }),
        extensions: None,
    });

    let response = facilitator.verify(&payload, &requirements).await.unwrap();
    assert!(!response.is_valid);
    assert_eq!(response.invalid_reason.as_deref(), Some("expired_signature"));
    assert_eq!(
        response.intent_trace.unwrap().reason_code,
        ReasonCode::SignatureExpired
    );
}

#[tokio::test]
async fn wildcard_facilitator_serves_concrete_network() {
    // The facilitator registers on eip155:*; a resource on eip155:8453 must
    // resolve to it, both in its advertised kinds and at dispatch time.
    struct PromiseScheme;

    impl SchemeNetworkServer for PromiseScheme {
        fn scheme(&self) -> &str {
            "exact"
        }

        fn parse_price(
            &self,
            _price: &Price,
            _network: &Network,
        ) -> Result<AssetAmount, SchemeError> {
            Ok(AssetAmount {
                amount: "10000".to_string(),
                asset: "USDC".to_string(),
                extra: None,
            })
        }
    }

    #[async_trait]
    impl SchemeNetworkFacilitator for PromiseScheme {
        fn scheme(&self) -> &str {
            "exact"
        }

        async fn verify(
            &self,
            _payload: &proto::PaymentPayload,
            _requirements: &PaymentRequirements,
        ) -> Result<VerifyResponse, FacilitatorError> {
            Ok(VerifyResponse::valid("0xPayer"))
        }

        async fn settle(
            &self,
            _payload: &proto::PaymentPayload,
            requirements: &PaymentRequirements,
        ) -> Result<SettleResponse, FacilitatorError> {
            Ok(SettleResponse::success(
                "0xtx",
                requirements.network.to_string(),
                "0xPayer",
            ))
        }
    }

    let mut facilitator = FacilitatorLocal::new();
    facilitator.register("eip155:*".parse().unwrap(), Arc::new(PromiseScheme));
    facilitator.advertise_network("eip155:8453".parse().unwrap());

    let supported = facilitator.get_supported().await.unwrap();
    assert_eq!(supported.kinds.len(), 1);
    assert_eq!(supported.kinds[0].network, "eip155:8453");

    let mut inner = X402ResourceServer::with_facilitator(Arc::new(facilitator));
    inner.register("eip155:*".parse().unwrap(), Arc::new(PromiseScheme));
    let route = RouteConfig::new(PaymentOption::new(
        "exact",
        "eip155:8453".parse().unwrap(),
        "0xRecipient".to_string(),
        Price::from("$0.01"),
    ));
    inner.initialize(std::slice::from_ref(&route)).await.unwrap();

    let requirements = inner.build_payment_requirements(&route).unwrap();
    assert_eq!(requirements.len(), 1);
    let payload = proto::PaymentPayload::V2(v2::PaymentPayload {
        x402_version: v2::X402Version2,
        resource: ResourceInfo {
            url: "https://api.example.com/data".to_string(),
            description: String::new(),
            mime_type: "application/json".to_string(),
        },
        accepted: requirements[0].clone(),
        payload: json!({ "signature": "0xabc" }),
        extensions: None,
    });
    let verification = inner
        .verify_payment(&payload, &requirements[0])
        .await
        .unwrap();
    assert!(verification.is_valid);

    let settlement = inner.settle_payment(&payload, &requirements[0]).await.unwrap();
    assert!(settlement.success);
    assert_eq!(settlement.network, "eip155:8453");
}
