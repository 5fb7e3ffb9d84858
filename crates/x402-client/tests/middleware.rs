//! Middleware tests: transparent 402 handling against a mock resource server.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_client::{X402Payments, X402PaymentsClient, settlement_from_response};
use x402_types::headers;
use x402_types::network::Network;
use x402_types::proto::{PaymentRequirements, ResourceInfo, SettleResponse, v1, v2};
use x402_types::scheme::{SchemeError, SchemeNetworkClient};

struct CashClient;

#[async_trait]
impl SchemeNetworkClient for CashClient {
    fn scheme(&self) -> &str {
        "cash"
    }

    async fn create_payment_payload(
        &self,
        requirements: &PaymentRequirements,
        _resource: Option<&ResourceInfo>,
    ) -> Result<serde_json::Value, SchemeError> {
        Ok(json!({
            "signature": "~John",
            "name": "John",
            "amount": requirements.amount,
        }))
    }
}

fn cash_requirements() -> PaymentRequirements {
    PaymentRequirements {
        scheme: "cash".to_string(),
        network: "x402:cash".parse::<Network>().unwrap(),
        asset: "USD".to_string(),
        amount: "1".to_string(),
        pay_to: "Alice".to_string(),
        max_timeout_seconds: 300,
        extra: serde_json::Map::new(),
    }
}

fn payments_client() -> X402PaymentsClient {
    X402PaymentsClient::new()
        .register("x402:cash".parse().unwrap(), Arc::new(CashClient))
        .register_v1("x402:cash".parse().unwrap(), Arc::new(CashClient))
}

fn http_client(payments: X402PaymentsClient) -> reqwest_middleware::ClientWithMiddleware {
    reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(X402Payments::new(payments))
        .build()
}

#[tokio::test]
async fn v2_402_is_paid_and_retried() {
    let server = MockServer::start().await;
    let resource = ResourceInfo {
        url: format!("{}/report", server.uri()),
        description: "Report".to_string(),
        mime_type: "application/json".to_string(),
    };
    let payment_required = v2::PaymentRequired {
        x402_version: v2::X402Version2,
        resource,
        accepts: vec![cash_requirements()],
        error: None,
        extensions: None,
    };
    let required_header = headers::encode_payment_required_header(&payment_required).unwrap();
    let settlement = SettleResponse::success("John transferred 1 USD to Alice", "x402:cash", "~John");
    let response_header =
        headers::encode_payment_response_header(&settlement, &cash_requirements()).unwrap();

    // Paid requests succeed; everything else gets the 402 challenge.
    Mock::given(method("GET"))
        .and(path("/report"))
        .and(header_exists("PAYMENT-SIGNATURE"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("PAYMENT-RESPONSE", response_header.as_str())
                .set_body_json(json!({ "weather": "sunny" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header("PAYMENT-REQUIRED", required_header.as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = http_client(payments_client());
    let response = client
        .get(format!("{}/report", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let envelope = settlement_from_response(&response).unwrap().unwrap();
    assert!(envelope.settlement.success);
    assert_eq!(
        envelope.settlement.transaction,
        "John transferred 1 USD to Alice"
    );

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["weather"], "sunny");
}

#[tokio::test]
async fn v2_retry_carries_signed_accepted_requirement() {
    let server = MockServer::start().await;
    let resource = ResourceInfo {
        url: format!("{}/report", server.uri()),
        description: String::new(),
        mime_type: "application/json".to_string(),
    };
    let payment_required = v2::PaymentRequired {
        x402_version: v2::X402Version2,
        resource,
        accepts: vec![cash_requirements()],
        error: None,
        extensions: None,
    };
    let required_header = headers::encode_payment_required_header(&payment_required).unwrap();

    Mock::given(method("GET"))
        .and(path("/report"))
        .and(header_exists("PAYMENT-SIGNATURE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(
            ResponseTemplate::new(402)
                .insert_header("PAYMENT-REQUIRED", required_header.as_str()),
        )
        .mount(&server)
        .await;

    let client = http_client(payments_client());
    client
        .get(format!("{}/report", server.uri()))
        .send()
        .await
        .unwrap();

    // Inspect what actually went over the wire.
    let requests = server.received_requests().await.unwrap();
    let paid = requests
        .iter()
        .find(|r| r.headers.contains_key("PAYMENT-SIGNATURE"))
        .expect("retry with payment header");
    let raw = paid.headers.get("PAYMENT-SIGNATURE").unwrap().to_str().unwrap();
    let decoded = headers::decode_payment_signature_header(raw).unwrap();
    match decoded {
        x402_types::proto::PaymentPayload::V2(p) => {
            assert_eq!(p.accepted, cash_requirements());
            assert_eq!(p.payload["signature"], "~John");
        }
        other => panic!("expected V2 payload, got {other:?}"),
    }
}

#[tokio::test]
async fn v1_body_402_uses_x_payment_header() {
    let server = MockServer::start().await;
    let body = v1::PaymentRequired {
        x402_version: v1::X402Version1,
        accepts: vec![cash_requirements()],
        error: Some("X-PAYMENT header is required".to_string()),
    };

    Mock::given(method("GET"))
        .and(path("/report"))
        .and(header_exists("X-PAYMENT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(402).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = http_client(payments_client());
    let response = client
        .get(format!("{}/report", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let requests = server.received_requests().await.unwrap();
    let paid = requests
        .iter()
        .find(|r| r.headers.contains_key("X-PAYMENT"))
        .expect("retry with V1 payment header");
    let raw = paid.headers.get("X-PAYMENT").unwrap().to_str().unwrap();
    match headers::decode_payment_signature_header(raw).unwrap() {
        x402_types::proto::PaymentPayload::V1(p) => {
            assert_eq!(p.scheme, "cash");
            assert_eq!(p.network, "x402:cash");
        }
        other => panic!("expected V1 payload, got {other:?}"),
    }
}

#[tokio::test]
async fn non_402_responses_pass_through_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "open": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = http_client(payments_client());
    let response = client
        .get(format!("{}/open", server.uri()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn unpayable_402_surfaces_descriptive_error() {
    let server = MockServer::start().await;
    let mut exotic = cash_requirements();
    exotic.scheme = "exact".to_string();
    exotic.network = "eip155:8453".parse().unwrap();
    let body = v1::PaymentRequired {
        x402_version: v1::X402Version1,
        accepts: vec![exotic],
        error: None,
    };
    Mock::given(method("GET"))
        .and(path("/report"))
        .respond_with(ResponseTemplate::new(402).set_body_json(&body))
        .mount(&server)
        .await;

    let client = http_client(payments_client());
    let err = client
        .get(format!("{}/report", server.uri()))
        .send()
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("No supported payment requirements"));
}
