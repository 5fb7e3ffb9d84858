//! HTTP endpoints implemented by an x402 **facilitator**.
//!
//! These are the server-side handlers a facilitator exposes to resource
//! servers: the protocol-critical `POST /verify` and `POST /settle`, the
//! discovery endpoints `GET /supported` and `GET /health`, and
//! machine-readable descriptors on `GET /verify` and `GET /settle`.
//!
//! The handlers are generic over any
//! [`FacilitatorClient`](x402_types::facilitator::FacilitatorClient), so they
//! serve an in-process [`FacilitatorLocal`](x402_facilitator_local::FacilitatorLocal)
//! as readily as a proxying client.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use x402_types::facilitator::{FacilitatorClient, FacilitatorError};
use x402_types::proto::{PaymentPayload, PaymentRequirements};

/// Wire shape of `POST /verify` and `POST /settle` bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorHttpRequest {
    pub x402_version: u8,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

/// Builds the facilitator router for the given state.
pub fn routes<A>() -> Router<A>
where
    A: FacilitatorClient + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(get_root))
        .route("/verify", get(get_verify_info))
        .route("/verify", post(post_verify::<A>))
        .route("/settle", get(get_settle_info))
        .route("/settle", post(post_settle::<A>))
        .route("/supported", get(get_supported::<A>))
        .route("/health", get(get_health::<A>))
}

/// `GET /`: a simple greeting, useful as a liveness probe.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    (StatusCode::OK, format!("Hello from {pkg_name}!"))
}

/// `GET /verify`: a machine-readable description of the `/verify` endpoint.
#[instrument(skip_all)]
pub async fn get_verify_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/verify",
        "description": "POST to verify x402 payments",
        "body": {
            "x402Version": "number",
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

/// `GET /settle`: a machine-readable description of the `/settle` endpoint.
#[instrument(skip_all)]
pub async fn get_settle_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/settle",
        "description": "POST to settle x402 payments",
        "body": {
            "x402Version": "number",
            "paymentPayload": "PaymentPayload",
            "paymentRequirements": "PaymentRequirements",
        }
    }))
}

/// `GET /supported`: the payment kinds and extensions this facilitator
/// handles. Resource servers call this at initialization to build their
/// facilitator directory.
#[instrument(skip_all)]
pub async fn get_supported<A>(State(facilitator): State<A>) -> impl IntoResponse
where
    A: FacilitatorClient,
{
    match facilitator.get_supported().await {
        Ok(supported) => (StatusCode::OK, Json(json!(supported))).into_response(),
        Err(error) => {
            tracing::warn!(%error, "Failed to list supported kinds");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn get_health<A>(State(facilitator): State<A>) -> impl IntoResponse
where
    A: FacilitatorClient,
{
    get_supported(State(facilitator)).await
}

/// `POST /verify`: verifies a proposed payment against its requirements.
#[instrument(skip_all)]
pub async fn post_verify<A>(
    State(facilitator): State<A>,
    Json(body): Json<FacilitatorHttpRequest>,
) -> impl IntoResponse
where
    A: FacilitatorClient,
{
    match facilitator
        .verify(&body.payment_payload, &body.payment_requirements)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(json!(response))).into_response(),
        Err(error) => {
            tracing::warn!(%error, "Verification failed");
            verify_error_response(&error)
        }
    }
}

/// `POST /settle`: executes a verified payment. Typically called after a
/// successful `/verify`.
#[instrument(skip_all)]
pub async fn post_settle<A>(
    State(facilitator): State<A>,
    Json(body): Json<FacilitatorHttpRequest>,
) -> impl IntoResponse
where
    A: FacilitatorClient,
{
    match facilitator
        .settle(&body.payment_payload, &body.payment_requirements)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(json!(response))).into_response(),
        Err(error) => {
            tracing::warn!(%error, "Settlement failed");
            settle_error_response(&error)
        }
    }
}

fn error_status(error: &FacilitatorError) -> StatusCode {
    match error {
        FacilitatorError::Unsupported { .. } | FacilitatorError::Aborted(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn verify_error_response(error: &FacilitatorError) -> Response {
    let body = json!({
        "isValid": false,
        "invalidReason": error.to_string(),
    });
    (error_status(error), Json(body)).into_response()
}

fn settle_error_response(error: &FacilitatorError) -> Response {
    let body = json!({
        "success": false,
        "errorReason": error.to_string(),
        "transaction": "",
        "network": "",
    });
    (error_status(error), Json(body)).into_response()
}
