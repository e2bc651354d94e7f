use crate::*;

use std::time::Instant;

use axum::http::StatusCode;
use axum::routing::post;
use axum::Json;
use mqbridge_core::config::{BrokerConfig, CorrelationMode, GatewayConfig, TopicConfig};
use mqbridge_services::RequestGateway;
use serde_json::json;

// ══════════════════════════════════════════════════════════════════════════════
//  Downstream Failures
// ══════════════════════════════════════════════════════════════════════════════

/// Nothing listens at the downstream URL: the agent still replies, carrying
/// the failure, and the gateway answers 200.
#[tokio::test]
async fn test_unreachable_downstream_still_replies() -> Result<()> {
    let dead = unreachable_url().await?;
    let bridge = start_bridge(Some(&dead), 3_000, CorrelationMode::Keyed).await?;

    let (status, body) = get_json(&bridge.endpoint("/ping")).await?;

    assert_eq!(status, 200);
    let message = &body["response"]["message"];
    assert!(
        message["error"].as_str().is_some_and(|e| !e.is_empty()),
        "expected an error description, got {message}"
    );
    assert_eq!(body["response"]["received"], json!({ "ask": "ping" }));
    Ok(())
}

/// A downstream 500 with a plain-text body comes back as status_code + text.
#[tokio::test]
async fn test_downstream_non_json_body() -> Result<()> {
    let app = axum::Router::new().route(
        "/ping",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error") }),
    );
    let addr = spawn_http(app, "broken").await?;
    let bridge = start_bridge(
        Some(&format!("http://{addr}/ping")),
        3_000,
        CorrelationMode::Keyed,
    )
    .await?;

    let (status, body) = get_json(&bridge.endpoint("/ping")).await?;

    assert_eq!(status, 200);
    assert_eq!(
        body["response"]["message"],
        json!({ "status_code": 500, "text": "Internal Server Error" })
    );
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Timeouts
// ══════════════════════════════════════════════════════════════════════════════

/// No agent: 504 after the timeout, never before it.
#[tokio::test]
async fn test_no_agent_times_out() -> Result<()> {
    let bridge = start_bridge(None, 500, CorrelationMode::Keyed).await?;

    let started = Instant::now();
    let (status, body) = get_json(&bridge.endpoint("/ping")).await?;
    let elapsed = started.elapsed();

    assert_eq!(status, 504);
    assert_eq!(body, json!({ "error": "timeout waiting for response" }));
    assert!(elapsed >= Duration::from_millis(500), "answered early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_500), "answered late: {elapsed:?}");

    let (_, stats) = get_json(&bridge.endpoint("/status")).await?;
    assert_eq!(stats["timeouts"], 1);
    assert_eq!(stats["in_flight"], 0);
    Ok(())
}

/// No agent in single-slot mode behaves the same way.
#[tokio::test]
async fn test_no_agent_times_out_single_slot() -> Result<()> {
    let bridge = start_bridge(None, 300, CorrelationMode::SingleSlot).await?;

    let (status, body) = get_json(&bridge.endpoint("/ping")).await?;

    assert_eq!(status, 504);
    assert_eq!(body["error"], "timeout waiting for response");
    Ok(())
}

/// A reply that arrives after its caller gave up is dropped and never
/// answers a later call.
#[tokio::test]
async fn test_late_reply_is_not_returned_to_next_call() -> Result<()> {
    let app = axum::Router::new().route(
        "/ping",
        post(|Json(body): Json<Value>| async move {
            if body["slow"] == json!(true) {
                tokio::time::sleep(Duration::from_millis(600)).await;
            }
            Json(json!({ "message": format!("reply {}", body["n"]) }))
        }),
    );
    let addr = spawn_http(app, "slow").await?;
    let bridge = start_bridge(
        Some(&format!("http://{addr}/ping")),
        300,
        CorrelationMode::SingleSlot,
    )
    .await?;
    let request_url = bridge.endpoint("/request");

    let (status, _) = post_json(&request_url, &json!({ "n": 1, "slow": true })).await?;
    assert_eq!(status, 504);

    // Let the late reply land while nothing is pending.
    wait_for_condition(Duration::from_secs(2), || {
        bridge.gateway.status().dropped_replies >= 1
    })
    .await?;

    let (status, body) = post_json(&request_url, &json!({ "n": 2 })).await?;
    assert_eq!(status, 200);
    assert_eq!(body["response"]["message"], "reply 2");
    assert_eq!(body["response"]["received"]["n"], 2);
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Broker Failures
// ══════════════════════════════════════════════════════════════════════════════

/// Once the broker is gone the request cannot be published: 502, no wait.
#[tokio::test]
async fn test_closed_broker_answers_bad_gateway() -> Result<()> {
    let echo = spawn_echo().await?;
    let bridge = start_bridge(Some(&echo), 3_000, CorrelationMode::Keyed).await?;
    mqbridge_services::Broker::shutdown(bridge.broker.as_ref()).await;

    let started = Instant::now();
    let (status, body) = get_json(&bridge.endpoint("/ping")).await?;

    assert_eq!(status, 502);
    assert!(body["error"].as_str().is_some());
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

/// An MQTT broker that never comes up: the request queue fills, yet every
/// /ping still answers 504 close to the configured timeout.
#[tokio::test]
async fn test_unreachable_mqtt_broker_answers_within_timeout() -> Result<()> {
    let dead = TcpListener::bind("127.0.0.1:0").await?;
    let port = dead.local_addr()?.port();
    drop(dead);

    let broker_config = BrokerConfig {
        host: "127.0.0.1".to_string(),
        port,
        channel_capacity: 2,
        reconnect_delay_ms: 50,
        ..Default::default()
    };
    let broker = mqbridge_services::broker::connect(&broker_config, "integration");
    let gateway_config = GatewayConfig {
        port: 0,
        timeout_ms: 400,
        correlation: CorrelationMode::Keyed,
    };
    let gateway = RequestGateway::start(broker, &TopicConfig::default(), &gateway_config).await?;
    let state = mqbridge_api::GatewayState::new(gateway.clone());
    let addr = spawn_http(mqbridge_api::gateway_router(state), "gateway").await?;

    for attempt in 0..5 {
        let started = Instant::now();
        let (status, body) = tokio::time::timeout(
            Duration::from_secs(3),
            get_json(&format!("http://{addr}/ping")),
        )
        .await
        .context("gateway hung on a full publish queue")??;
        let elapsed = started.elapsed();

        assert_eq!(status, 504, "attempt {attempt}: {body}");
        assert!(elapsed >= Duration::from_millis(400), "attempt {attempt} early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1_400), "attempt {attempt} late: {elapsed:?}");
    }

    gateway.shutdown().await;
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
//  Malformed Requests
// ══════════════════════════════════════════════════════════════════════════════

/// A body that is not JSON is refused with a JSON error, not plain text.
#[tokio::test]
async fn test_malformed_request_body_gets_json_error() -> Result<()> {
    let bridge = start_bridge(None, 500, CorrelationMode::Keyed).await?;

    let response = reqwest::Client::new()
        .post(bridge.endpoint("/request"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await?;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.context("error body is not JSON")?;
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert_eq!(bridge.gateway.status().calls, 0);
    Ok(())
}
