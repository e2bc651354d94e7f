//! Pending reply table — one wait handle per correlation id.
//!
//! Entries are removed on delivery, and by the [`ReplyWaiter`] when it is
//! dropped (timeout, caller gone, publish failure). A reply whose id has no
//! entry is dropped, which also absorbs at-least-once duplicates.

use std::sync::Arc;

use dashmap::DashMap;
use mqbridge_core::CorrelationId;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::correlator::CorrelationError;

#[derive(Clone, Default)]
pub struct PendingReplies {
    /// correlation id → sender half of the waiter's channel
    waiters: Arc<DashMap<CorrelationId, oneshot::Sender<Value>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self {
            waiters: Arc::new(DashMap::new()),
        }
    }

    /// Start waiting for the reply to `id`. Register before publishing.
    pub fn register(&self, id: CorrelationId) -> ReplyWaiter {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id.clone(), tx);
        ReplyWaiter {
            id,
            rx,
            table: self.clone(),
        }
    }

    /// Route a reply to its waiter. Returns false if nobody is waiting.
    pub fn deliver(&self, id: &CorrelationId, reply: Value) -> bool {
        match self.waiters.remove(id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    /// Number of requests still waiting for a reply.
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Wake every waiter with [`CorrelationError::Abandoned`].
    pub fn clear(&self) {
        self.waiters.clear();
    }
}

/// Receiving end of one registered request.
pub struct ReplyWaiter {
    id: CorrelationId,
    rx: oneshot::Receiver<Value>,
    table: PendingReplies,
}

impl ReplyWaiter {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    pub async fn wait(mut self, deadline: Instant) -> Result<Value, CorrelationError> {
        match tokio::time::timeout_at(deadline, &mut self.rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CorrelationError::Abandoned),
            Err(_) => Err(CorrelationError::Timeout),
        }
    }
}

impl Drop for ReplyWaiter {
    fn drop(&mut self) {
        self.table.waiters.remove(&self.id);
    }
}
