//! Broker abstraction — publish envelopes, subscribe to topics.
//!
//! The gateway and agent only see [`Broker`]. `MqttBroker` talks MQTT v5 to
//! a real broker; `MemoryBroker` fans out inside one process.

mod memory;
mod mqtt;
mod router;

pub use memory::MemoryBroker;
pub use mqtt::MqttBroker;
pub use router::TopicRouter;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mqbridge_core::config::{BrokerConfig, Transport};
use mqbridge_core::CorrelationId;
use tokio::sync::mpsc;

/// One message on one topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub topic: String,
    pub payload: Bytes,
    /// Carried beside the payload (MQTT v5 correlation data), never inside it.
    pub correlation: Option<CorrelationId>,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            correlation: None,
        }
    }

    pub fn with_correlation(mut self, correlation: Option<CorrelationId>) -> Self {
        self.correlation = correlation;
        self
    }
}

/// Stream of envelopes for one subscribed topic. Ends when the broker shuts down.
pub type Subscription = mpsc::UnboundedReceiver<Envelope>;

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("broker connection is shut down")]
    Closed,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish with at-least-once delivery, not retained.
    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError>;

    /// Subscribe to an exact topic name with at-least-once delivery. Does
    /// not wait for the broker to acknowledge.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError>;

    /// Unsubscribe everything and release the connection.
    async fn shutdown(&self);
}

/// Build the broker selected by config. `role` tags the MQTT client id.
pub fn connect(config: &BrokerConfig, role: &str) -> Arc<dyn Broker> {
    match config.transport {
        Transport::Mqtt => Arc::new(MqttBroker::connect(config, role)),
        Transport::Memory => Arc::new(MemoryBroker::new()),
    }
}
