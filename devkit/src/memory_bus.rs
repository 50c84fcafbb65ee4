/*!
In-memory bus for developing and testing without a broker.

Records every published message, routes it to local subscribers through the
same [`Router`] the MQTT backend uses, and can be told to fail or stall so
recovery paths can be exercised.
*/

use async_trait::async_trait;
use hoststat_core::bus::Router;
use hoststat_core::snapshot;
use hoststat_core::{Bus, BusError, MetricSnapshot, Payload, Subscription, SubscriptionId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct Inner {
    router: Router,
    published: Mutex<Vec<PublishedMessage>>,
    subscribe_calls: Mutex<Vec<String>>,
    publish_failures: AtomicUsize,
    subscribe_failures: AtomicUsize,
    offline: AtomicBool,
    subscribe_delay: Mutex<Option<Duration>>,
}

/// Cloneable handle; clones share the same topics and recordings.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` publishes fail with `Unavailable`.
    pub fn fail_next_publishes(&self, count: usize) {
        self.inner.publish_failures.store(count, Ordering::SeqCst);
    }

    /// The next `count` subscribes fail with `Unavailable`.
    pub fn fail_next_subscribes(&self, count: usize) {
        self.inner.subscribe_failures.store(count, Ordering::SeqCst);
    }

    /// While offline every publish and subscribe fails.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Subscribes wait this long before the route is added.
    pub fn set_subscribe_delay(&self, delay: Option<Duration>) {
        *self.inner.subscribe_delay.lock() = delay;
    }

    /// Delivers a payload to subscribers without recording it as published.
    pub fn inject(&self, topic: &str, payload: impl Into<Vec<u8>>) -> usize {
        let payload = payload.into();
        let delivered = self.inner.router.dispatch(topic, &payload);
        log::debug!("[memory-bus] injected {} bytes on {topic} ({delivered} receivers)", payload.len());
        delivered
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.published.lock().clone()
    }

    pub fn find_messages_by_topic(&self, topic: &str) -> Vec<PublishedMessage> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|msg| msg.topic == topic)
            .cloned()
            .collect()
    }

    /// Decodes every snapshot published on `topic`, skipping undecodable ones.
    pub fn snapshots_on(&self, topic: &str) -> Vec<MetricSnapshot> {
        self.find_messages_by_topic(topic)
            .iter()
            .filter_map(|msg| snapshot::decode(&msg.payload).ok())
            .collect()
    }

    pub fn subscribe_calls(&self) -> Vec<String> {
        self.inner.subscribe_calls.lock().clone()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.router.active()
    }

    pub fn active_on(&self, topic: &str) -> usize {
        self.inner.router.active_on(topic)
    }

    /// Forgets recorded messages and subscribe calls; live routes stay.
    pub fn clear(&self) {
        self.inner.published.lock().clear();
        self.inner.subscribe_calls.lock().clear();
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Payload) -> Result<(), BusError> {
        if self.inner.offline.load(Ordering::SeqCst)
            || Self::take_failure(&self.inner.publish_failures)
        {
            log::warn!("[memory-bus] publish to {topic} failed (injected)");
            return Err(BusError::Unavailable("memory bus offline".into()));
        }

        let delivered = self.inner.router.dispatch(topic, &payload);
        log::info!("[memory-bus] published {} bytes to {topic} ({delivered} receivers)", payload.len());
        self.inner.published.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        self.inner.subscribe_calls.lock().push(topic.to_string());

        let delay = *self.inner.subscribe_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.offline.load(Ordering::SeqCst)
            || Self::take_failure(&self.inner.subscribe_failures)
        {
            log::warn!("[memory-bus] subscribe to {topic} failed (injected)");
            return Err(BusError::Unavailable("memory bus offline".into()));
        }

        log::info!("[memory-bus] subscribed to {topic}");
        Ok(self.inner.router.add(topic))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        let removed = self
            .inner
            .router
            .remove(id)
            .ok_or(BusError::UnknownSubscription(id))?;
        log::info!("[memory-bus] unsubscribed {id} from {}", removed.topic);
        Ok(())
    }
}
