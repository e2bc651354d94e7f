//! Request gateway — one synchronous call = one publish + one bounded wait.
//!
//! A routing task consumes the reply subscription. Replies carrying a
//! correlation id go to the [`PendingReplies`] table; replies without one go
//! to the single-slot [`Correlator`].
//!
//! In `Keyed` mode each call registers its own id, so calls run
//! concurrently. In `SingleSlot` mode calls take turns on the slot; a call
//! that cannot get its turn before its deadline times out like any other.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mqbridge_core::config::{CorrelationMode, GatewayConfig, TopicConfig};
use mqbridge_core::{payload, CorrelationId, CorrelationIdGenerator};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::broker::{Broker, BrokerError, Envelope, Subscription};
use crate::correlator::{CorrelationError, Correlator};
use crate::pending::PendingReplies;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("timeout waiting for response")]
    Timeout,
    #[error("request not published: {0}")]
    Broker(#[from] BrokerError),
    #[error("gateway is shutting down")]
    Closed,
}

impl From<CorrelationError> for GatewayError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::Timeout => GatewayError::Timeout,
            CorrelationError::Abandoned => GatewayError::Closed,
        }
    }
}

#[derive(Debug, Default)]
struct GatewayStats {
    calls: AtomicU64,
    replies: AtomicU64,
    timeouts: AtomicU64,
    dropped_replies: AtomicU64,
}

/// Point-in-time view for `/status`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub correlation: CorrelationMode,
    pub timeout_ms: u64,
    pub in_flight: usize,
    pub calls: u64,
    pub replies: u64,
    pub timeouts: u64,
    pub dropped_replies: u64,
}

pub struct RequestGateway {
    broker: Arc<dyn Broker>,
    request_topic: String,
    mode: CorrelationMode,
    default_timeout: Duration,
    ids: CorrelationIdGenerator,
    pending: PendingReplies,
    correlator: Arc<Correlator>,
    /// Serializes single-slot calls.
    slot_turn: tokio::sync::Mutex<()>,
    stats: Arc<GatewayStats>,
    router: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl RequestGateway {
    /// Subscribe to the reply topic and start routing replies.
    pub async fn start(
        broker: Arc<dyn Broker>,
        topics: &TopicConfig,
        config: &GatewayConfig,
    ) -> Result<Arc<Self>, BrokerError> {
        let replies = broker.subscribe(&topics.response).await?;

        let gateway = Arc::new(Self {
            broker,
            request_topic: topics.request.clone(),
            mode: config.correlation,
            default_timeout: config.timeout(),
            ids: CorrelationIdGenerator::new(),
            pending: PendingReplies::new(),
            correlator: Arc::new(Correlator::new()),
            slot_turn: tokio::sync::Mutex::new(()),
            stats: Arc::new(GatewayStats::default()),
            router: Mutex::new(None),
            closed: AtomicBool::new(false),
        });

        let task = tokio::spawn(route_replies(
            replies,
            gateway.pending.clone(),
            gateway.correlator.clone(),
            gateway.stats.clone(),
        ));
        *gateway.router.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);

        tracing::info!(
            request_topic = %topics.request,
            response_topic = %topics.response,
            mode = ?config.correlation,
            timeout_ms = config.timeout_ms,
            "request gateway ready"
        );
        Ok(gateway)
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Publish `request` and wait up to `timeout` for its reply.
    ///
    /// Every step, publishing included, is bounded by the same deadline.
    pub async fn call(&self, request: Value, timeout: Duration) -> Result<Value, GatewayError> {
        let deadline = Instant::now() + timeout;
        self.stats.calls.fetch_add(1, Ordering::Relaxed);
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Closed);
        }

        let result = match self.mode {
            CorrelationMode::Keyed => self.call_keyed(request, deadline).await,
            CorrelationMode::SingleSlot => self.call_single_slot(request, deadline).await,
        };

        match &result {
            Ok(_) => {
                self.stats.replies.fetch_add(1, Ordering::Relaxed);
            }
            Err(GatewayError::Timeout) => {
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(?timeout, "no reply in time");
            }
            Err(e) => tracing::warn!(error = %e, "call failed"),
        }
        result
    }

    /// [`call`](Self::call) with the configured timeout.
    pub async fn call_default(&self, request: Value) -> Result<Value, GatewayError> {
        self.call(request, self.default_timeout).await
    }

    async fn call_keyed(&self, request: Value, deadline: Instant) -> Result<Value, GatewayError> {
        let id = self.ids.next_id();
        // Registered before publishing; dropping the waiter on any early
        // return removes the entry.
        let waiter = self.pending.register(id.clone());
        self.publish(&request, Some(id), deadline).await?;
        Ok(waiter.wait(deadline).await?)
    }

    async fn call_single_slot(
        &self,
        request: Value,
        deadline: Instant,
    ) -> Result<Value, GatewayError> {
        let _turn = tokio::time::timeout_at(deadline, self.slot_turn.lock())
            .await
            .map_err(|_| GatewayError::Timeout)?;

        self.correlator.reset();
        // Checked after reset: a shutdown racing us either shows here or
        // abandons the slot we just armed.
        if self.closed.load(Ordering::Acquire) {
            self.correlator.abandon();
            return Err(GatewayError::Closed);
        }
        if let Err(e) = self.publish(&request, None, deadline).await {
            self.correlator.abandon();
            return Err(e);
        }
        Ok(self.correlator.await_reply(deadline).await?)
    }

    /// Publish, giving up at `deadline`. A broker that cannot take the
    /// message in time (e.g. a full MQTT request queue during an outage)
    /// counts as a timeout.
    async fn publish(
        &self,
        request: &Value,
        correlation: Option<CorrelationId>,
        deadline: Instant,
    ) -> Result<(), GatewayError> {
        tracing::debug!(
            topic = %self.request_topic,
            correlation = correlation.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            %request,
            "publishing request"
        );
        let envelope = Envelope::new(self.request_topic.clone(), payload::encode(request))
            .with_correlation(correlation);
        match tokio::time::timeout_at(deadline, self.broker.publish(envelope)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(
                    topic = %self.request_topic,
                    "broker did not accept request before deadline"
                );
                Err(GatewayError::Timeout)
            }
        }
    }

    pub fn status(&self) -> GatewayStatus {
        let in_flight = match self.mode {
            CorrelationMode::Keyed => self.pending.len(),
            CorrelationMode::SingleSlot => usize::from(self.correlator.is_pending()),
        };
        GatewayStatus {
            correlation: self.mode,
            timeout_ms: u64::try_from(self.default_timeout.as_millis()).unwrap_or(u64::MAX),
            in_flight,
            calls: self.stats.calls.load(Ordering::Relaxed),
            replies: self.stats.replies.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
            dropped_replies: self.stats.dropped_replies.load(Ordering::Relaxed),
        }
    }

    /// Stop routing replies, wake outstanding callers, release the broker.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let router = self
            .router
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = router {
            task.abort();
        }
        self.pending.clear();
        self.correlator.abandon();
        self.broker.shutdown().await;
        tracing::info!("request gateway stopped");
    }
}

async fn route_replies(
    mut replies: Subscription,
    pending: PendingReplies,
    correlator: Arc<Correlator>,
    stats: Arc<GatewayStats>,
) {
    while let Some(envelope) = replies.recv().await {
        let reply = payload::decode_or_raw(&envelope.payload);

        let delivered = match &envelope.correlation {
            Some(id) => pending.deliver(id, reply),
            None => correlator.deliver(reply),
        };

        if delivered {
            tracing::debug!(
                correlation = envelope.correlation.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                "reply delivered"
            );
        } else {
            stats.dropped_replies.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                correlation = envelope.correlation.as_ref().map(|id| id.as_str()).unwrap_or("-"),
                "reply with no waiting caller dropped"
            );
        }
    }
    tracing::debug!("reply subscription closed");
}
