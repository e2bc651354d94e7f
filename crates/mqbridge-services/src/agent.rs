//! Response agent — answers every request on the request topic.
//!
//! For each envelope: decode (falling back to `{"raw": …}`), forward to the
//! downstream service, and publish `{"message", "received"}` on the reply
//! topic with the request's correlation id copied over. Each envelope is
//! handled on its own task; a failure in one never stops the loop.

use std::sync::Arc;

use mqbridge_core::config::{AgentConfig, TopicConfig};
use mqbridge_core::payload::{self, ReplyPayload};

use crate::broker::{Broker, BrokerError, Envelope};
use crate::downstream::HttpDownstream;

pub struct ResponseAgent {
    broker: Arc<dyn Broker>,
    topics: TopicConfig,
    downstream: HttpDownstream,
}

impl ResponseAgent {
    pub fn new(
        broker: Arc<dyn Broker>,
        topics: TopicConfig,
        config: &AgentConfig,
    ) -> Result<Self, reqwest::Error> {
        let downstream =
            HttpDownstream::new(config.downstream_url.clone(), config.downstream_timeout())?;
        Ok(Self {
            broker,
            topics,
            downstream,
        })
    }

    /// Subscribe and serve until the broker closes the subscription.
    pub async fn run(self: Arc<Self>) -> Result<(), BrokerError> {
        let mut requests = self.broker.subscribe(&self.topics.request).await?;
        tracing::info!(
            topic = %self.topics.request,
            downstream = %self.downstream.url(),
            "response agent listening"
        );

        while let Some(envelope) = requests.recv().await {
            let agent = self.clone();
            tokio::spawn(async move {
                agent.handle(envelope).await;
            });
        }

        tracing::info!("request subscription closed, agent stopping");
        Ok(())
    }

    /// Process one request envelope and publish exactly one reply.
    pub async fn handle(&self, envelope: Envelope) {
        let received = payload::decode_or_raw(&envelope.payload);
        let message = self.downstream.reply_content(&received).await;
        let reply = ReplyPayload::new(message, received);
        let body = payload::encode(&reply.to_value());

        let correlation = envelope.correlation.as_ref().map(|id| id.to_string());
        let out = Envelope::new(self.topics.response.clone(), body)
            .with_correlation(envelope.correlation);

        match self.broker.publish(out).await {
            Ok(()) => tracing::info!(
                correlation = correlation.as_deref().unwrap_or("-"),
                request = %reply.received,
                response = %reply.message,
                "reply published"
            ),
            Err(e) => tracing::warn!(
                correlation = correlation.as_deref().unwrap_or("-"),
                error = %e,
                "reply publish failed"
            ),
        }
    }
}
