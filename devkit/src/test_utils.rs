/*!
Test harness for hoststat components

- In-memory bus set up and logging initialised once per test binary
- Expectations on how many messages land on a topic
- Polling helpers for state that settles asynchronously
*/

use crate::memory_bus::MemoryBus;
use anyhow::Result;
use hoststat_core::MetricSnapshot;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub struct TestHarness {
    pub bus: MemoryBus,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        init_logging();

        Self {
            bus: MemoryBus::new(),
            expectations: Vec::new(),
        }
    }

    /// Expect exactly `count` messages published on `topic`.
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual_count = self.bus.find_messages_by_topic(&expectation.topic).len();
            if actual_count != expectation.expected_count {
                anyhow::bail!(
                    "expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic,
                    expectation.expected_count,
                    actual_count
                );
            }
        }
        log::info!("verified {} expectations", self.expectations.len());
        Ok(())
    }

    /// Waits for a decodable snapshot to be published on `topic`.
    pub async fn wait_for_snapshot(&self, topic: &str, timeout: Duration) -> Option<MetricSnapshot> {
        let bus = self.bus.clone();
        let mut found = None;
        wait_until(timeout, || {
            found = bus.snapshots_on(topic).last().copied();
            found.is_some()
        })
        .await;
        found
    }

    pub fn assert_snapshot_sent(&self, topic: &str, expected: &MetricSnapshot) -> Result<()> {
        if self.bus.snapshots_on(topic).iter().any(|s| s == expected) {
            return Ok(());
        }
        anyhow::bail!("expected snapshot {:?} not found on topic {}", expected, topic);
    }

    pub fn stats(&self) -> TestStats {
        let mut topic_counts = HashMap::new();
        let messages = self.bus.published();
        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }
        TestStats {
            total_messages: messages.len(),
            topic_counts,
            active_subscriptions: self.bus.active_subscriptions(),
        }
    }

    pub fn reset(&mut self) {
        self.bus.clear();
        self.expectations.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub active_subscriptions: usize,
}

pub fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Polls `condition` every few milliseconds until it holds or `timeout` runs
/// out. Returns the last result.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
