use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{Bus, Payload, Router, Subscription, SubscriptionId};
use crate::backoff::Backoff;
use crate::config::BrokerConfig;
use crate::error::BusError;

/// Bus backed by an MQTT broker.
///
/// Publishes go out at QoS 0 without retain: a viewer that subscribes late
/// gets no backlog. Several local subscriptions on one topic share a single
/// broker subscription; incoming messages are fanned out by the [`Router`].
pub struct MqttBus {
    client: AsyncClient,
    router: Arc<Router>,
    /// Held while a route change and its broker request are queued, so the
    /// broker sees SUBSCRIBE/UNSUBSCRIBE in the same order as the router.
    broker_ops: Arc<Mutex<()>>,
    connected: Arc<AtomicBool>,
    event_loop: JoinHandle<()>,
}

impl MqttBus {
    /// Starts the connection in the background. Must be called inside a
    /// tokio runtime.
    pub fn connect(config: &BrokerConfig, client_prefix: &str) -> Self {
        let client_id = config.client_id_or(client_prefix);
        let mut opts = MqttOptions::new(&client_id, &config.host, config.port);
        opts.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        opts.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(opts, 10);
        let router = Arc::new(Router::new());
        let connected = Arc::new(AtomicBool::new(false));
        let broker_ops = Arc::new(Mutex::new(()));

        info!(client_id = %client_id, host = %config.host, port = config.port, "connecting to MQTT broker");
        let event_loop = tokio::spawn(drive(
            eventloop,
            client.clone(),
            router.clone(),
            broker_ops.clone(),
            connected.clone(),
        ));

        Self {
            client,
            router,
            broker_ops,
            connected,
            event_loop,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.router.active()
    }

    /// Waits until the broker has acknowledged the connection.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_connected() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.is_connected()
    }

    /// Sends DISCONNECT and stops the event loop.
    pub async fn close(self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("disconnect not sent: {e}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        // Drop aborts the event loop.
    }
}

impl Drop for MqttBus {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[async_trait]
impl Bus for MqttBus {
    async fn publish(&self, topic: &str, payload: Payload) -> Result<(), BusError> {
        if !self.is_connected() {
            return Err(BusError::Unavailable("not connected to broker".into()));
        }
        // try_publish never waits on a stalled connection; a full request
        // queue is reported like an outage.
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)
            .map_err(|e| BusError::Unavailable(e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        if !self.is_connected() {
            return Err(BusError::Unavailable("not connected to broker".into()));
        }
        let _guard = self.broker_ops.lock();
        let attached = self.router.attach(topic);
        if attached.first_on_topic {
            // Routes that outlive a reconnect are re-subscribed on ConnAck.
            if let Err(e) = self.client.try_subscribe(topic, QoS::AtMostOnce) {
                self.router.remove(attached.subscription.id());
                return Err(BusError::Unavailable(e.to_string()));
            }
        }
        Ok(attached.subscription)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        let _guard = self.broker_ops.lock();
        let removed = self
            .router
            .remove(id)
            .ok_or(BusError::UnknownSubscription(id))?;
        if removed.topic_empty {
            self.client
                .try_unsubscribe(removed.topic.as_str())
                .map_err(|e| BusError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    router: Arc<Router>,
    broker_ops: Arc<Mutex<()>>,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = Backoff::from_millis(500, 10_000);
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::Publish(p))) => {
                router.dispatch(&p.topic, &p.payload);
            }
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
                backoff.mark_success();
                info!("MQTT connected");
                // Clean session: the broker forgot our subscriptions.
                let _guard = broker_ops.lock();
                for topic in router.topics() {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
                        warn!(topic = %topic, "re-subscribe failed: {e}");
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Relaxed);
                let delay = backoff.mark_failure(Instant::now());
                error!("MQTT connection error: {e}, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
