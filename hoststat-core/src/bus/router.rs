use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use super::{Payload, Subscription, SubscriptionId};

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

struct Route {
    id: SubscriptionId,
    sender: mpsc::Sender<Payload>,
}

/// Result of removing a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub topic: String,
    /// No subscriber is left on the topic.
    pub topic_empty: bool,
}

/// Result of adding a route.
#[derive(Debug)]
pub struct Attached {
    pub subscription: Subscription,
    /// No other subscriber was on the topic.
    pub first_on_topic: bool,
}

/// Local topic -> subscriber table shared by every bus backend.
///
/// Topics are matched exactly; keys are flat so there are no wildcards.
pub struct Router {
    next_id: AtomicU64,
    capacity: usize,
    routes: RwLock<HashMap<String, Vec<Route>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// `capacity` bounds each subscriber's queue of undelivered payloads.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, topic: &str) -> Subscription {
        self.attach(topic).subscription
    }

    /// Adds a route and reports, under the same lock, whether it is the
    /// first one on its topic.
    pub fn attach(&self, topic: &str) -> Attached {
        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.capacity);
        let first_on_topic = {
            let mut routes = self.routes.write();
            let list = routes.entry(topic.to_string()).or_default();
            list.push(Route { id, sender });
            list.len() == 1
        };
        debug!(%id, topic, first_on_topic, "route added");
        Attached {
            subscription: Subscription::new(id, topic.to_string(), receiver),
            first_on_topic,
        }
    }

    pub fn remove(&self, id: SubscriptionId) -> Option<Removed> {
        let mut routes = self.routes.write();
        let topic = routes
            .iter()
            .find(|(_, list)| list.iter().any(|r| r.id == id))
            .map(|(topic, _)| topic.clone())?;

        let list = routes.get_mut(&topic)?;
        list.retain(|r| r.id != id);
        let topic_empty = list.is_empty();
        if topic_empty {
            routes.remove(&topic);
        }
        debug!(%id, topic = %topic, "route removed");
        Some(Removed { topic, topic_empty })
    }

    /// Hands `payload` to every subscriber of `topic`; returns how many got it.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let routes = self.routes.read();
            let Some(list) = routes.get(topic) else {
                trace!(topic, "no subscriber");
                return 0;
            };
            for route in list {
                match route.sender.try_send(payload.to_vec()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!(id = %route.id, topic, "subscriber queue full, message dropped");
                    }
                    Err(TrySendError::Closed(_)) => closed.push(route.id),
                }
            }
        }
        for id in closed {
            self.remove(id);
        }
        delivered
    }

    /// Number of live subscriptions across all topics.
    pub fn active(&self) -> usize {
        self.routes.read().values().map(Vec::len).sum()
    }

    pub fn active_on(&self, topic: &str) -> usize {
        self.routes.read().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        self.routes.read().keys().cloned().collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
