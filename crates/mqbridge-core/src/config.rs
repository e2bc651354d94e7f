//! Configuration system for mqbridge.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MQBRIDGE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/mqbridge/config.toml
//!   3. ~/.config/mqbridge/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::payload::{REQUEST_TOPIC, RESPONSE_TOPIC};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MqbridgeConfig {
    pub broker: BrokerConfig,
    pub topics: TopicConfig,
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
    pub echo: EchoConfig,
}

/// Which broker implementation carries envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// MQTT v5 over TCP.
    Mqtt,
    /// In-process fan-out. Only useful when every role runs in one process.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub transport: Transport,
    pub host: String,
    pub port: u16,
    pub keep_alive_secs: u64,
    /// Prefix for the MQTT client id. The role name is appended.
    pub client_id: String,
    /// Pause between event loop polls after a connection error.
    pub reconnect_delay_ms: u64,
    /// Capacity of the MQTT client request channel.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub request: String,
    pub response: String,
}

/// How the gateway matches replies to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Every request carries a correlation id; any number of calls in flight.
    Keyed,
    /// One call at a time through a single reply slot. Compatible with
    /// agents that do not echo correlation data.
    SingleSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Time to wait for a reply before answering 504.
    pub timeout_ms: u64,
    pub correlation: CorrelationMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Downstream endpoint that receives every request as a JSON POST.
    pub downstream_url: String,
    pub downstream_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// HTTP listen port for the downstream echo service.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::Mqtt,
            host: "localhost".to_string(),
            port: 1883,
            keep_alive_secs: 60,
            client_id: "mqbridge".to_string(),
            reconnect_delay_ms: 1_000,
            channel_capacity: 64,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            request: REQUEST_TOPIC.to_string(),
            response: RESPONSE_TOPIC.to_string(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            timeout_ms: 3_000,
            correlation: CorrelationMode::Keyed,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            downstream_url: "http://localhost:5001/ping".to_string(),
            downstream_timeout_ms: 5_000,
        }
    }
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self { port: 5001 }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl AgentConfig {
    pub fn downstream_timeout(&self) -> Duration {
        Duration::from_millis(self.downstream_timeout_ms)
    }
}

impl BrokerConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("mqbridge")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MqbridgeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, falling back to defaults if it is missing.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            MqbridgeConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MQBRIDGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        write_default_at(&path)?;
        Ok(path)
    }

    /// Apply MQBRIDGE_* overrides, reading values through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MQBRIDGE_BROKER__TRANSPORT") {
            match v.as_str() {
                "mqtt" => self.broker.transport = Transport::Mqtt,
                "memory" => self.broker.transport = Transport::Memory,
                _ => {}
            }
        }
        if let Some(v) = lookup("MQBRIDGE_BROKER__HOST") {
            self.broker.host = v;
        }
        if let Some(p) = lookup("MQBRIDGE_BROKER__PORT").and_then(|v| v.parse().ok()) {
            self.broker.port = p;
        }
        if let Some(s) = lookup("MQBRIDGE_BROKER__KEEP_ALIVE_SECS").and_then(|v| v.parse().ok()) {
            self.broker.keep_alive_secs = s;
        }
        if let Some(v) = lookup("MQBRIDGE_BROKER__CLIENT_ID") {
            self.broker.client_id = v;
        }
        if let Some(ms) = lookup("MQBRIDGE_BROKER__RECONNECT_DELAY_MS").and_then(|v| v.parse().ok())
        {
            self.broker.reconnect_delay_ms = ms;
        }
        if let Some(n) = lookup("MQBRIDGE_BROKER__CHANNEL_CAPACITY").and_then(|v| v.parse().ok()) {
            self.broker.channel_capacity = n;
        }
        if let Some(v) = lookup("MQBRIDGE_TOPICS__REQUEST") {
            self.topics.request = v;
        }
        if let Some(v) = lookup("MQBRIDGE_TOPICS__RESPONSE") {
            self.topics.response = v;
        }
        if let Some(p) = lookup("MQBRIDGE_GATEWAY__PORT").and_then(|v| v.parse().ok()) {
            self.gateway.port = p;
        }
        if let Some(ms) = lookup("MQBRIDGE_GATEWAY__TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.gateway.timeout_ms = ms;
        }
        if let Some(v) = lookup("MQBRIDGE_GATEWAY__CORRELATION") {
            match v.as_str() {
                "keyed" => self.gateway.correlation = CorrelationMode::Keyed,
                "single_slot" => self.gateway.correlation = CorrelationMode::SingleSlot,
                _ => {}
            }
        }
        if let Some(v) = lookup("MQBRIDGE_AGENT__DOWNSTREAM_URL") {
            self.agent.downstream_url = v;
        }
        if let Some(ms) = lookup("MQBRIDGE_AGENT__DOWNSTREAM_TIMEOUT_MS").and_then(|v| v.parse().ok())
        {
            self.agent.downstream_timeout_ms = ms;
        }
        if let Some(p) = lookup("MQBRIDGE_ECHO__PORT").and_then(|v| v.parse().ok()) {
            self.echo.port = p;
        }
    }
}

fn write_default_at(path: &std::path::Path) -> Result<(), ConfigError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&MqbridgeConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
    }
    Ok(())
}
