use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{Broker, BrokerError, Envelope, Subscription, TopicRouter};

/// In-process broker. Publishes reach current subscribers only.
#[derive(Default)]
pub struct MemoryBroker {
    router: TopicRouter,
    closed: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscriptions on `topic`. Lets callers wait for a subscriber
    /// before publishing, since nothing is retained.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.router.subscriber_count(topic)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        let delivered = self.router.route(envelope);
        tracing::trace!(delivered, "memory broker publish");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BrokerError::Closed);
        }
        Ok(self.router.add(topic))
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.router.clear();
    }
}
