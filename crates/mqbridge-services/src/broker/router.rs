use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{Envelope, Subscription};

/// Fans incoming envelopes out to every subscription on the same topic.
#[derive(Clone, Default)]
pub struct TopicRouter {
    // topic -> live subscriber channels
    routes: Arc<DashMap<String, Vec<mpsc::UnboundedSender<Envelope>>>>,
}

impl TopicRouter {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
        }
    }

    pub fn add(&self, topic: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.entry(topic.to_string()).or_default().push(tx);
        rx
    }

    /// Deliver to every live subscriber. Returns how many received it.
    pub fn route(&self, envelope: Envelope) -> usize {
        let Some(mut subscribers) = self.routes.get_mut(&envelope.topic) else {
            return 0;
        };
        subscribers.retain(|tx| !tx.is_closed());
        let mut delivered = 0;
        for tx in subscribers.iter() {
            if tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.routes
            .get(topic)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Topics with at least one subscription, for re-subscribing after a reconnect.
    pub fn topics(&self) -> Vec<String> {
        self.routes.iter().map(|e| e.key().clone()).collect()
    }

    /// Drop all subscriber channels; their receivers see end-of-stream.
    pub fn clear(&self) {
        self.routes.clear();
    }
}
