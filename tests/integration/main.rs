//! mqbridge integration test harness.
//!
//! Every test assembles a whole bridge inside the test process: a downstream
//! HTTP service on an ephemeral port, the in-memory broker, a response agent
//! and a request gateway served over real HTTP. Nothing external is needed:
//!
//!   cargo test --test integration
//!
//! Each test owns its bridge; ports are never shared.

mod concurrency;
mod failures;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;

use mqbridge_core::config::{AgentConfig, CorrelationMode, GatewayConfig, TopicConfig};
use mqbridge_services::{MemoryBroker, RequestGateway, ResponseAgent};

// ── Harness ───────────────────────────────────────────────────────────────────

/// A running bridge. Dropping it leaves the spawned tasks to die with the
/// test runtime.
pub struct Bridge {
    pub broker: Arc<MemoryBroker>,
    pub gateway: Arc<RequestGateway>,
    /// Base URL of the gateway's HTTP server, e.g. `http://127.0.0.1:40123`.
    pub url: String,
}

impl Bridge {
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

/// Serve `app` on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_http(app: Router, name: &'static str) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = mqbridge_api::serve_on(listener, app, name).await {
            eprintln!("{name} server failed: {e}");
        }
    });
    Ok(addr)
}

/// The stock echo service. Returns its `/ping` URL.
pub async fn spawn_echo() -> Result<String> {
    let addr = spawn_http(mqbridge_api::echo_router(), "echo").await?;
    Ok(format!("http://{addr}/ping"))
}

/// A URL nothing listens on: bind a port, then release it.
pub async fn unreachable_url() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}/ping"))
}

/// Start a bridge. With `downstream = None` no agent runs, so every call
/// times out.
pub async fn start_bridge(
    downstream: Option<&str>,
    timeout_ms: u64,
    correlation: CorrelationMode,
) -> Result<Bridge> {
    let broker = Arc::new(MemoryBroker::new());
    let topics = TopicConfig::default();

    if let Some(url) = downstream {
        let agent_config = AgentConfig {
            downstream_url: url.to_string(),
            downstream_timeout_ms: 2_000,
        };
        let agent = Arc::new(ResponseAgent::new(broker.clone(), topics.clone(), &agent_config)?);
        tokio::spawn(agent.run());
        // The memory broker retains nothing; wait for the agent to subscribe.
        wait_for_condition(Duration::from_secs(2), || {
            broker.subscriber_count(&topics.request) > 0
        })
        .await?;
    }

    let gateway_config = GatewayConfig {
        port: 0,
        timeout_ms,
        correlation,
    };
    let gateway = RequestGateway::start(broker.clone(), &topics, &gateway_config).await?;
    let state = mqbridge_api::GatewayState::new(gateway.clone());
    let addr = spawn_http(mqbridge_api::gateway_router(state), "gateway").await?;

    Ok(Bridge {
        broker,
        gateway,
        url: format!("http://{addr}"),
    })
}

/// Poll `condition` every 10ms until it holds or `limit` passes.
pub async fn wait_for_condition<F>(limit: Duration, mut condition: F) -> Result<()>
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    bail!("condition not met within {limit:?}")
}

/// GET `url`; returns the status code and the decoded JSON body.
pub async fn get_json(url: &str) -> Result<(u16, Value)> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("GET {url} failed"))?;
    let status = response.status().as_u16();
    let body = response.json().await.context("response body is not JSON")?;
    Ok((status, body))
}

/// POST `body` as JSON to `url`; returns the status code and decoded body.
pub async fn post_json(url: &str, body: &Value) -> Result<(u16, Value)> {
    let response = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("POST {url} failed"))?;
    let status = response.status().as_u16();
    let body = response.json().await.context("response body is not JSON")?;
    Ok((status, body))
}
