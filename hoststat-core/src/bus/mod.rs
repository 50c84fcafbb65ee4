//! Publish/subscribe capability used by collectors and viewers.
//!
//! Delivery is at-most-once and fire-and-forget: a subscriber only sees
//! messages published after its subscription is routed, and a subscriber
//! that falls behind loses messages rather than slowing the publisher.

mod mqtt;
mod router;

pub use mqtt::MqttBus;
pub use router::{Attached, Removed, Router, DEFAULT_QUEUE_CAPACITY};

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;

use crate::error::BusError;

pub type Payload = Vec<u8>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A live subscription. Payloads for its topic arrive through [`recv`].
///
/// Dropping it stops delivery as well; the route is pruned the next time a
/// message is dispatched on the topic. Call [`Bus::unsubscribe`] to release
/// it deterministically.
///
/// [`recv`]: Subscription::recv
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    receiver: mpsc::Receiver<Payload>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, topic: String, receiver: mpsc::Receiver<Payload>) -> Self {
        Self { id, topic, receiver }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next payload, or `None` once the subscription has been released.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Payload> {
        self.receiver.try_recv().ok()
    }
}

#[async_trait]
pub trait Bus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Payload) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;
}
