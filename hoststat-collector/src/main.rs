//! Hoststat collector - publishes this host's CPU, memory and disk usage
//!
//! - Samples the machine once per interval
//! - Publishes a CBOR snapshot on `<namespace>.<host_id>` over MQTT
//! - Optionally registers with the directory to learn its topic
//! - Keeps sampling through broker outages, backing off between attempts

mod collector;
mod config;
mod registration;
mod sampler;

use anyhow::{Context, Result};
use collector::Collector;
use config::CollectorConfig;
use hoststat_core::bus::MqttBus;
use hoststat_core::Bus;
use sampler::SystemSampler;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    hoststat_core::logging::init("info");

    let cfg = CollectorConfig::load().await.context("failed to load collector config")?;
    info!(host_id = cfg.host_id, "starting hoststat collector v{}", env!("CARGO_PKG_VERSION"));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;
    let topic = registration::resolve_topic(&client, &cfg).await;

    let bus = Arc::new(MqttBus::connect(&cfg.broker, "hoststat-collector"));
    if !bus.wait_connected(Duration::from_secs(5)).await {
        // Not fatal: ticks fail and back off until the broker shows up.
        warn!("broker not reachable yet, collecting anyway");
    }

    let collector = Collector::new(
        SystemSampler::new(&cfg.disk_mount),
        bus.clone() as Arc<dyn Bus>,
        topic,
        cfg.interval(),
        cfg.backoff.build(),
    );
    info!(topic = collector.topic(), "publishing");

    tokio::select! {
        res = collector.run() => res.context("collector stopped")?,
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("shutting down");
        }
    }

    if let Ok(bus) = Arc::try_unwrap(bus) {
        bus.close().await;
    }
    Ok(())
}
