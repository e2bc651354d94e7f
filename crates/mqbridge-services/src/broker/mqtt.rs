//! MQTT v5 adapter over rumqttc.
//!
//! A driver task owns the event loop. It fans incoming publishes out through
//! the [`TopicRouter`] and re-subscribes every known topic on each ConnAck,
//! so subscriptions survive broker restarts. Connection errors are logged and
//! the loop keeps polling; rumqttc reconnects on the next poll.
//!
//! SUBSCRIBE requests are queued with `try_subscribe`. A topic the client's
//! request queue cannot take right now (it fills up while the broker is
//! unreachable) stays in the deferred set and is retried on every pass of
//! the driver until it is queued.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mqbridge_core::config::BrokerConfig;
use mqbridge_core::CorrelationId;
use rumqttc::v5::mqttbytes::v5::{Packet, Publish, PublishProperties};
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{Broker, BrokerError, Envelope, Subscription, TopicRouter};

const DRIVER_STOP_GRACE: Duration = Duration::from_secs(1);

type Deferred = Arc<Mutex<BTreeSet<String>>>;

pub struct MqttBroker {
    client: AsyncClient,
    router: TopicRouter,
    deferred: Deferred,
    stopping: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBroker {
    /// Create the client and spawn its driver. Connecting happens in the
    /// background; publishes queue until the session is up.
    pub fn connect(config: &BrokerConfig, role: &str) -> Self {
        let client_id = format!("{}-{}", config.client_id, role);
        let mut options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(config.keep_alive());

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let router = TopicRouter::new();
        let deferred = Deferred::default();
        let (stopping, stopping_rx) = watch::channel(false);

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id,
            "connecting to MQTT broker"
        );

        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            router.clone(),
            deferred.clone(),
            config.reconnect_delay(),
            stopping_rx,
        ));

        Self {
            client,
            router,
            deferred,
            stopping,
            driver: Mutex::new(Some(driver)),
        }
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn publish(&self, envelope: Envelope) -> Result<(), BrokerError> {
        let Envelope {
            topic,
            payload,
            correlation,
        } = envelope;

        let result = match correlation {
            Some(id) => {
                let properties = PublishProperties {
                    correlation_data: Some(Bytes::copy_from_slice(id.as_bytes())),
                    ..Default::default()
                };
                self.client
                    .publish_with_properties(
                        topic.clone(),
                        QoS::AtLeastOnce,
                        false,
                        payload,
                        properties,
                    )
                    .await
            }
            None => {
                self.client
                    .publish(topic.clone(), QoS::AtLeastOnce, false, payload)
                    .await
            }
        };

        result.map_err(|e| BrokerError::Publish {
            topic,
            reason: e.to_string(),
        })
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        if *self.stopping.borrow() {
            return Err(BrokerError::Closed);
        }
        // Register the route first so a ConnAck racing this call re-subscribes it.
        let subscription = self.router.add(topic);
        lock(&self.deferred).insert(topic.to_string());
        retry_subscriptions(&self.client, &self.deferred);
        tracing::debug!(topic, "subscription requested");
        Ok(subscription)
    }

    async fn shutdown(&self) {
        let _ = self.stopping.send(true);
        for topic in self.router.topics() {
            if let Err(e) = self.client.try_unsubscribe(topic.clone()) {
                tracing::debug!(topic, error = %e, "unsubscribe not queued");
            }
        }
        // Never await the request queue here: during an outage it is full.
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "disconnect not queued");
        }
        self.router.clear();
        lock(&self.deferred).clear();

        let driver = self
            .driver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut driver) = driver {
            if tokio::time::timeout(DRIVER_STOP_GRACE, &mut driver)
                .await
                .is_err()
            {
                driver.abort();
            }
        }
        tracing::info!("MQTT connection released");
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    router: TopicRouter,
    deferred: Deferred,
    reconnect_delay: Duration,
    stopping: watch::Receiver<bool>,
) {
    loop {
        retry_subscriptions(&client, &deferred);
        let event = eventloop.poll().await;
        let stopping_now = *stopping.borrow();

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "MQTT session established");
                lock(&deferred).extend(router.topics());
                retry_subscriptions(&client, &deferred);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let envelope = envelope_from(publish);
                let topic = envelope.topic.clone();
                if router.route(envelope) == 0 {
                    tracing::debug!(topic, "publish with no local subscriber");
                }
            }
            Ok(Event::Incoming(Packet::Disconnect(_))) if stopping_now => break,
            Ok(_) => {}
            Err(e) => {
                if stopping_now {
                    break;
                }
                tracing::warn!(
                    error = %e,
                    retry_in = ?reconnect_delay,
                    "MQTT connection error"
                );
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }
    tracing::debug!("MQTT driver stopped");
}

/// Queue a SUBSCRIBE for every deferred topic. Topics the client cannot
/// take right now stay deferred for the next pass. Never awaits, since the
/// driver calling this is the one that drains the queue.
fn retry_subscriptions(client: &AsyncClient, deferred: &Mutex<BTreeSet<String>>) {
    lock(deferred).retain(|topic| {
        match client.try_subscribe(topic.clone(), QoS::AtLeastOnce) {
            Ok(()) => false,
            Err(e) => {
                tracing::debug!(topic, error = %e, "subscribe deferred");
                true
            }
        }
    });
}

fn lock(deferred: &Mutex<BTreeSet<String>>) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
    deferred.lock().unwrap_or_else(|e| e.into_inner())
}

fn envelope_from(publish: Publish) -> Envelope {
    let correlation = publish
        .properties
        .as_ref()
        .and_then(|p| p.correlation_data.as_ref())
        .and_then(|data| CorrelationId::from_bytes(data));
    Envelope {
        topic: String::from_utf8_lossy(&publish.topic).into_owned(),
        payload: publish.payload,
        correlation,
    }
}
