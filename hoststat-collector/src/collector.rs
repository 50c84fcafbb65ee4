use hoststat_core::{snapshot, Backoff, Bus, CodecError, MetricSnapshot};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::sampler::Sampler;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("snapshot could not be encoded: {0}")]
    Encode(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Published(MetricSnapshot),
    /// The bus refused the message; the next attempt waits for the backoff.
    PublishFailed,
    /// Still inside the backoff window, nothing sampled.
    Deferred,
}

/// Samples one host and publishes a snapshot on its topic every interval.
pub struct Collector<S> {
    sampler: S,
    bus: Arc<dyn Bus>,
    topic: String,
    interval: Duration,
    backoff: Backoff,
}

impl<S: Sampler> Collector<S> {
    pub fn new(sampler: S, bus: Arc<dyn Bus>, topic: impl Into<String>, interval: Duration, backoff: Backoff) -> Self {
        Self {
            sampler,
            bus,
            topic: topic.into(),
            interval,
            backoff,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// One collection cycle. Only an encode failure is an error; a bus
    /// failure is logged and retried once the backoff allows.
    pub async fn tick(&mut self) -> Result<TickOutcome, CollectorError> {
        if !self.backoff.should_retry(Instant::now()) {
            return Ok(TickOutcome::Deferred);
        }

        let snap = self.sampler.sample();
        let payload = snapshot::encode(&snap)?;

        match self.bus.publish(&self.topic, payload).await {
            Ok(()) => {
                if self.backoff.is_backing_off() {
                    info!(topic = %self.topic, "publishing resumed");
                }
                self.backoff.mark_success();
                debug!(topic = %self.topic, ?snap, "snapshot published");
                Ok(TickOutcome::Published(snap))
            }
            Err(e) => {
                let delay = self.backoff.mark_failure(Instant::now());
                warn!(topic = %self.topic, "publish failed: {e}, retrying in {delay:?}");
                Ok(TickOutcome::PublishFailed)
            }
        }
    }

    /// Ticks forever. Late ticks are skipped rather than bunched up.
    pub async fn run(mut self) -> Result<(), CollectorError> {
        info!(topic = %self.topic, interval = ?self.interval, "collector started");
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.tick().await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::{Metric, SampleError};
    use hoststat_devkit::TestHarness;

    /// Fixed readings; `None` reports the metric as unavailable.
    struct ScriptedSampler {
        cpu: Option<f64>,
        mem: Option<f64>,
        disk: Option<f64>,
    }

    fn reading(metric: Metric, value: Option<f64>) -> Result<f64, SampleError> {
        value.ok_or_else(|| SampleError::Unavailable(metric, "scripted".into()))
    }

    impl Sampler for ScriptedSampler {
        fn cpu(&mut self) -> Result<f64, SampleError> {
            reading(Metric::Cpu, self.cpu)
        }
        fn memory(&mut self) -> Result<f64, SampleError> {
            reading(Metric::Memory, self.mem)
        }
        fn disk(&mut self) -> Result<f64, SampleError> {
            reading(Metric::Disk, self.disk)
        }
    }

    fn collector(harness: &TestHarness, sampler: ScriptedSampler) -> Collector<ScriptedSampler> {
        Collector::new(
            sampler,
            Arc::new(harness.bus.clone()),
            "host.stats.1",
            Duration::from_secs(1),
            Backoff::from_millis(2500, 10_000),
        )
    }

    #[tokio::test]
    async fn test_unavailable_memory_is_published_absent() {
        let harness = TestHarness::new();
        let mut collector = collector(
            &harness,
            ScriptedSampler {
                cpu: Some(42.5),
                mem: None,
                disk: Some(10.0),
            },
        );

        let expected = MetricSnapshot::new(Some(42.5), None, Some(10.0));
        assert_eq!(collector.tick().await.unwrap(), TickOutcome::Published(expected));
        harness.assert_snapshot_sent("host.stats.1", &expected).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_backs_off_then_resumes() {
        let mut harness = TestHarness::new();
        harness.expect_messages("host.stats.1", 2);
        harness.bus.fail_next_publishes(1);
        let mut collector = collector(
            &harness,
            ScriptedSampler {
                cpu: Some(1.0),
                mem: Some(2.0),
                disk: Some(3.0),
            },
        );

        assert_eq!(collector.tick().await.unwrap(), TickOutcome::PublishFailed);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(collector.tick().await.unwrap(), TickOutcome::Deferred);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(collector.tick().await.unwrap(), TickOutcome::Deferred);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(matches!(collector.tick().await.unwrap(), TickOutcome::Published(_)));
        // Backoff was reset by the success
        assert!(matches!(collector.tick().await.unwrap(), TickOutcome::Published(_)));

        harness.verify_expectations().unwrap();
    }

    #[tokio::test]
    async fn test_encode_failure_is_fatal() {
        let harness = TestHarness::new();
        let collector = collector(
            &harness,
            ScriptedSampler {
                cpu: Some(150.0),
                mem: None,
                disk: None,
            },
        );

        let err = collector.run().await.unwrap_err();
        assert!(matches!(err, CollectorError::Encode(CodecError::OutOfRange { .. })));
        assert!(harness.bus.published().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keeps_publishing_through_outage() {
        let harness = TestHarness::new();
        harness.bus.set_offline(true);
        let collector = collector(
            &harness,
            ScriptedSampler {
                cpu: Some(5.0),
                mem: Some(6.0),
                disk: None,
            },
        );
        let task = tokio::spawn(collector.run());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(harness.bus.published().is_empty());

        harness.bus.set_offline(false);
        let snap = harness
            .wait_for_snapshot("host.stats.1", Duration::from_secs(10))
            .await;
        assert_eq!(snap, Some(MetricSnapshot::new(Some(5.0), Some(6.0), None)));
        assert!(!task.is_finished());
        task.abort();
    }
}
