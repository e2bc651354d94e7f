//! Downstream echo service: answers "pong" to `{"ask": "ping"}`.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::Query;
use axum::Json;
use serde_json::{json, Value};

use mqbridge_core::payload;

// ── / (GET) ──────────────────────────────────────────────────────────────────

pub async fn handle_hello() -> &'static str {
    "Hello, World!"
}

// ── /ping (GET) ──────────────────────────────────────────────────────────────

/// Query parameters stand in for the request body.
pub async fn handle_echo_get(Query(args): Query<HashMap<String, String>>) -> Json<Value> {
    let request = json!(args);
    tracing::info!(%request, "echo request received");
    Json(json!({ "message": payload::pong_for(Some(&request)) }))
}

// ── /ping (POST) ─────────────────────────────────────────────────────────────

/// A body that is not JSON counts as no request at all.
pub async fn handle_echo_post(body: Bytes) -> Json<Value> {
    let request = payload::decode(&body).ok();
    match &request {
        Some(request) => tracing::info!(%request, "echo request received"),
        None => tracing::info!("echo request without JSON body"),
    }
    Json(json!({ "message": payload::pong_for(request.as_ref()) }))
}
