//! mqbridged — runs the request gateway, response agent, echo service, or all three.
//!
//! Usage: mqbridged [gateway|agent|echo|all]   (default: all)

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use mqbridge_core::config::{MqbridgeConfig, Transport};
use mqbridge_services::{broker, Broker, RequestGateway, ResponseAgent};

mod role;

use role::Role;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let role: Role = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("all")
        .parse()?;

    // Load config
    if let Err(e) = MqbridgeConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = MqbridgeConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        MqbridgeConfig::default()
    });
    tracing::info!(role = role.name(), "mqbridged starting");

    if config.broker.transport == Transport::Memory && role != Role::All {
        tracing::warn!(
            role = role.name(),
            "memory transport only reaches roles in this process"
        );
    }

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let broker: Option<Arc<dyn Broker>> = role
        .needs_broker()
        .then(|| broker::connect(&config.broker, role.name()));

    let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

    if role.runs_echo() {
        let port = config.echo.port;
        tasks.spawn(async move {
            let result = mqbridge_api::serve(mqbridge_api::echo_router(), port, "echo").await;
            ("echo service", result)
        });
    }

    if let (true, Some(broker)) = (role.runs_agent(), &broker) {
        let agent = ResponseAgent::new(broker.clone(), config.topics.clone(), &config.agent)
            .context("failed to build downstream HTTP client")?;
        let agent = Arc::new(agent);
        tasks.spawn(async move {
            let result = agent.run().await.map_err(anyhow::Error::from);
            ("response agent", result)
        });
    }

    let gateway = match (role.runs_gateway(), &broker) {
        (true, Some(broker)) => {
            let gateway = RequestGateway::start(broker.clone(), &config.topics, &config.gateway)
                .await
                .context("failed to subscribe to reply topic")?;
            let state = mqbridge_api::GatewayState::new(gateway.clone());
            let app = mqbridge_api::gateway_router(state);
            let port = config.gateway.port;
            tasks.spawn(async move {
                let result = mqbridge_api::serve(app, port, "gateway").await;
                ("gateway", result)
            });
            Some(gateway)
        }
        _ => None,
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        Some(joined) = tasks.join_next() => match joined {
            Ok((name, Ok(()))) => tracing::error!(task = name, "task exited"),
            Ok((name, Err(e))) => tracing::error!(task = name, error = %e, "task failed"),
            Err(e) => tracing::error!(error = %e, "task panicked"),
        },
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    if let Some(gateway) = gateway {
        gateway.shutdown().await;
    } else if let Some(broker) = broker {
        broker.shutdown().await;
    }
    tasks.abort_all();

    Ok(())
}
