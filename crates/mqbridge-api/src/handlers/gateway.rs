//! /ping, /request, /status handlers for the request gateway.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use mqbridge_core::payload;
use mqbridge_services::{GatewayError, GatewayStatus};

use super::GatewayState;

// ── /ping (GET) ──────────────────────────────────────────────────────────────

pub async fn handle_ping(State(state): State<GatewayState>) -> Response {
    let result = state.gateway.call_default(payload::ping_request()).await;
    into_response(result)
}

// ── /request (POST) ──────────────────────────────────────────────────────────

/// Forward an arbitrary JSON body as the request payload. A body that is
/// not JSON is refused with the extractor's status and a JSON error.
pub async fn handle_request(
    State(state): State<GatewayState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "request body refused");
            return (
                rejection.status(),
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };
    let result = state.gateway.call_default(request).await;
    into_response(result)
}

// ── /status (GET) ────────────────────────────────────────────────────────────

pub async fn handle_status(State(state): State<GatewayState>) -> Json<GatewayStatus> {
    Json(state.gateway.status())
}

/// 200 with the reply, or a distinct status per failure.
fn into_response(result: Result<Value, GatewayError>) -> Response {
    match result {
        Ok(reply) => (StatusCode::OK, Json(json!({ "response": reply }))).into_response(),
        Err(GatewayError::Timeout) => (
            StatusCode::GATEWAY_TIMEOUT,
            Json(json!({ "error": "timeout waiting for response" })),
        )
            .into_response(),
        Err(e @ GatewayError::Broker(_)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e @ GatewayError::Closed) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
