use std::time::Duration;
use tokio::time::Instant;

/// Exponential retry window for an operation that keeps failing.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    next_retry_at: Option<Instant>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            next_retry_at: None,
        }
    }

    pub fn from_millis(initial_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(initial_ms), Duration::from_millis(max_ms))
    }

    /// Record a failure; the next attempt is pushed out and the delay doubles.
    /// Returns the delay until the next attempt.
    pub fn mark_failure(&mut self, now: Instant) -> Duration {
        let delay = self.current;
        self.next_retry_at = Some(now + delay);
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn mark_success(&mut self) {
        self.current = self.initial;
        self.next_retry_at = None;
    }

    pub fn should_retry(&self, now: Instant) -> bool {
        self.next_retry_at.map_or(true, |at| now >= at)
    }

    pub fn is_backing_off(&self) -> bool {
        self.next_retry_at.is_some()
    }
}
