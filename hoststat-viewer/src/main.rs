//! Hoststat viewer - follow one host's live metrics from the terminal
//!
//! Lists the hosts known to the directory, then shows CPU, memory and disk
//! usage of whichever host is selected. Switching hosts drops the previous
//! feed before the next one starts.

mod config;
mod directory_client;
mod display;
mod shell;
mod subscription;

use anyhow::{Context, Result};
use config::ViewerConfig;
use directory_client::DirectoryClient;
use display::{render, Panel, WatchSink};
use hoststat_core::bus::MqttBus;
use hoststat_core::Backoff;
use shell::{host_list, parse_command, Command};
use std::sync::Arc;
use std::time::Duration;
use subscription::SubscriptionManager;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

const DIRECTORY_ATTEMPTS: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    // Quiet by default; the terminal belongs to the panel.
    hoststat_core::logging::init("warn");

    let cfg = ViewerConfig::load().await.context("failed to load viewer config")?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;
    let hosts = DirectoryClient::new(http, &cfg.directory_url)
        .list_with_retry(DIRECTORY_ATTEMPTS, Backoff::from_millis(500, 5000))
        .await
        .with_context(|| format!("could not load hosts from {}", cfg.directory_url))?;
    println!("{}", host_list(&hosts));

    let bus = Arc::new(MqttBus::connect(&cfg.broker, "hoststat-viewer"));
    if !bus.wait_connected(Duration::from_secs(5)).await {
        warn!("broker not reachable yet, selections may fail");
    }

    let (sink, panel) = WatchSink::new();
    let renderer = tokio::spawn(render_loop(panel, cfg.stale_after()));
    let mut manager =
        SubscriptionManager::new(bus.clone(), Arc::new(sink)).with_subscribe_timeout(cfg.subscribe_timeout());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line, hosts.len()) {
            None => {}
            Some(Command::Select(index)) => {
                let interrupt = async {
                    if tokio::signal::ctrl_c().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                };
                let outcome = manager.select_until(hosts[index].clone(), interrupt).await;
                match outcome {
                    None => break,
                    // Failures are already on the panel.
                    Some(Err(e)) => debug!(state = ?manager.state(), "select failed: {e}"),
                    Some(Ok(())) => {}
                }
            }
            Some(Command::Deselect) => manager.deselect().await,
            Some(Command::List) => {
                println!("{}", host_list(&hosts));
                if let Some(host) = manager.current_host() {
                    println!("Following {} (#{})", host.name(), host.id());
                }
            }
            Some(Command::Quit) => break,
            Some(Command::Invalid(msg)) => println!("{msg}"),
        }
    }

    manager.shutdown().await;
    renderer.abort();
    if let Ok(bus) = Arc::try_unwrap(bus) {
        bus.close().await;
    }
    Ok(())
}

/// Sole reader of the panel channel. Redraws on every change, and once a
/// second so a feed going quiet shows up as stale.
async fn render_loop(mut panel: watch::Receiver<Panel>, stale_after: Duration) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = String::new();
    loop {
        tokio::select! {
            changed = panel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {}
        }
        let text = render(&panel.borrow_and_update(), Instant::now(), stale_after);
        if text != last {
            println!("\n{text}");
            last = text;
        }
    }
}
