//! Live feed for the selected host
//!
//! At most one feed exists at a time. Switching hosts tears the old feed down
//! completely (broker subscription released, forwarder task stopped and
//! joined) before the new subscription is requested, so once `select`
//! returns nothing from the previous host can reach the display.

use hoststat_core::{snapshot, Bus, BusError, HostView, Subscription, SubscriptionId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::display::DisplaySink;

pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Subscribing,
    Active,
    /// Releasing the previous feed on the way to a new one.
    Switching,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("could not subscribe to {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: BusError,
    },
    #[error("subscribing to {topic} timed out after {timeout:?}")]
    SubscribeTimeout { topic: String, timeout: Duration },
}

struct Feed {
    host: HostView,
    subscription: SubscriptionId,
    forwarder: JoinHandle<()>,
}

pub struct SubscriptionManager {
    bus: Arc<dyn Bus>,
    sink: Arc<dyn DisplaySink>,
    subscribe_timeout: Duration,
    state: FeedState,
    feed: Option<Feed>,
}

impl SubscriptionManager {
    pub fn new(bus: Arc<dyn Bus>, sink: Arc<dyn DisplaySink>) -> Self {
        Self {
            bus,
            sink,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
            state: FeedState::Idle,
            feed: None,
        }
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn current_host(&self) -> Option<&HostView> {
        self.feed.as_ref().map(|feed| &feed.host)
    }

    /// Follows `host`, replacing any current feed. On failure the display
    /// shows the error for that host and the manager is left idle.
    pub async fn select(&mut self, host: HostView) -> Result<(), ViewerError> {
        if self.state == FeedState::Active && self.current_host().is_some_and(|h| h.id() == host.id()) {
            debug!(id = host.id(), "host already selected");
            return Ok(());
        }

        // Switching holds until the new feed is up; Subscribing is only
        // entered from Idle.
        if self.feed.is_some() {
            self.state = FeedState::Switching;
            self.release().await;
        } else {
            self.state = FeedState::Subscribing;
        }
        self.sink.host_selected(&host);
        let topic = host.topic.clone();

        let subscription = match tokio::time::timeout(self.subscribe_timeout, self.bus.subscribe(&topic)).await {
            Ok(Ok(subscription)) => subscription,
            Ok(Err(source)) => {
                return Err(self.fail(&host, ViewerError::Subscribe { topic, source }));
            }
            Err(_) => {
                let timeout = self.subscribe_timeout;
                return Err(self.fail(&host, ViewerError::SubscribeTimeout { topic, timeout }));
            }
        };

        info!(id = host.id(), topic = %topic, "following host");
        let id = subscription.id();
        let forwarder = tokio::spawn(forward(subscription, host.clone(), self.sink.clone()));
        self.feed = Some(Feed {
            host,
            subscription: id,
            forwarder,
        });
        self.state = FeedState::Active;
        Ok(())
    }

    /// Like [`select`](Self::select), but gives up as soon as `interrupt`
    /// resolves. Returns `None` when interrupted.
    pub async fn select_until<F>(
        &mut self,
        host: HostView,
        interrupt: F,
    ) -> Option<Result<(), ViewerError>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            res = self.select(host) => Some(res),
            _ = interrupt => None,
        }
    }

    /// Stops following the current host, if any.
    pub async fn deselect(&mut self) {
        self.release().await;
        self.state = FeedState::Idle;
        self.sink.cleared();
    }

    pub async fn shutdown(mut self) {
        self.release().await;
        self.state = FeedState::Idle;
    }

    fn fail(&mut self, host: &HostView, err: ViewerError) -> ViewerError {
        warn!(id = host.id(), "{err}");
        self.sink.host_failed(host, &err.to_string());
        self.state = FeedState::Idle;
        err
    }

    async fn release(&mut self) {
        let Some(feed) = self.feed.take() else {
            return;
        };
        if let Err(e) = self.bus.unsubscribe(feed.subscription).await {
            warn!(id = feed.host.id(), "unsubscribe failed: {e}");
        }
        feed.forwarder.abort();
        // Joined so no in-flight payload of this host is delivered later.
        match feed.forwarder.await {
            Err(e) if e.is_panic() => error!(id = feed.host.id(), "feed forwarder panicked: {e}"),
            _ => {}
        }
        debug!(id = feed.host.id(), "feed released");
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.forwarder.abort();
        }
    }
}

async fn forward(mut subscription: Subscription, host: HostView, sink: Arc<dyn DisplaySink>) {
    while let Some(payload) = subscription.recv().await {
        match snapshot::decode(&payload) {
            Ok(snap) => sink.snapshot(&host, snap),
            Err(e) => warn!(topic = subscription.topic(), "dropping undecodable snapshot: {e}"),
        }
    }
    debug!(topic = subscription.topic(), "subscription closed");
}
