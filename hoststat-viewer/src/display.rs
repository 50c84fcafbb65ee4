//! What the viewer shows, and the channel it travels on
//!
//! The subscription side only writes through [`DisplaySink`]; the render task
//! is the single reader of the watch channel behind [`WatchSink`], so panel
//! updates from any task are applied in one place.

use hoststat_core::{HostView, MetricSnapshot};
use std::fmt::Write;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub trait DisplaySink: Send + Sync {
    /// A host was picked; nothing received yet.
    fn host_selected(&self, host: &HostView);
    /// Overwrites the values shown for `host`.
    fn snapshot(&self, host: &HostView, snapshot: MetricSnapshot);
    /// The feed for `host` could not be opened.
    fn host_failed(&self, host: &HostView, reason: &str);
    /// No host selected.
    fn cleared(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Panel {
    Welcome,
    Waiting {
        host: HostView,
    },
    Live {
        host: HostView,
        snapshot: MetricSnapshot,
        received_at: Instant,
    },
    Failed {
        host: HostView,
        reason: String,
    },
}

pub struct WatchSink {
    tx: watch::Sender<Panel>,
}

impl WatchSink {
    pub fn new() -> (Self, watch::Receiver<Panel>) {
        let (tx, rx) = watch::channel(Panel::Welcome);
        (Self { tx }, rx)
    }
}

impl DisplaySink for WatchSink {
    fn host_selected(&self, host: &HostView) {
        self.tx.send_replace(Panel::Waiting { host: host.clone() });
    }

    fn snapshot(&self, host: &HostView, snapshot: MetricSnapshot) {
        self.tx.send_replace(Panel::Live {
            host: host.clone(),
            snapshot,
            received_at: Instant::now(),
        });
    }

    fn host_failed(&self, host: &HostView, reason: &str) {
        self.tx.send_replace(Panel::Failed {
            host: host.clone(),
            reason: reason.to_string(),
        });
    }

    fn cleared(&self) {
        self.tx.send_replace(Panel::Welcome);
    }
}

fn reading(label: &str, value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{label}: {v:.2} %"),
        None => format!("{label}: n/a"),
    }
}

/// Text for `panel` as of `now`.
pub fn render(panel: &Panel, now: Instant, stale_after: Duration) -> String {
    let mut out = String::new();
    match panel {
        Panel::Welcome => out.push_str("No host selected. Pick one from the list."),
        Panel::Waiting { host } => {
            let _ = writeln!(out, "{} (#{})", host.name(), host.id());
            let _ = writeln!(out, "Server IP: {}", host.record.ip);
            out.push_str("Waiting for data...");
        }
        Panel::Live {
            host,
            snapshot,
            received_at,
        } => {
            let stale = now.saturating_duration_since(*received_at) > stale_after;
            let _ = writeln!(
                out,
                "{} (#{}){}",
                host.name(),
                host.id(),
                if stale { " (stale)" } else { "" }
            );
            let _ = writeln!(out, "Server IP: {}", host.record.ip);
            out.push_str("Server Base Stats\n");
            let _ = writeln!(out, "{}", reading("CPU", snapshot.cpu));
            let _ = writeln!(out, "{}", reading("Memory", snapshot.mem));
            out.push_str(&reading("Disk", snapshot.disk));
        }
        Panel::Failed { host, reason } => {
            let _ = writeln!(out, "{} (#{})", host.name(), host.id());
            let _ = writeln!(out, "Server IP: {}", host.record.ip);
            let _ = write!(out, "Feed unavailable: {reason}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoststat_core::HostRecord;

    fn server_1() -> HostView {
        HostView {
            record: HostRecord::new(1, "Server 1", "10.11.11.11", "This is server 1"),
            topic: "host.stats.1".into(),
        }
    }

    #[test]
    fn test_live_panel() {
        let now = Instant::now();
        let panel = Panel::Live {
            host: server_1(),
            snapshot: MetricSnapshot::new(Some(42.5), None, Some(10.0)),
            received_at: now,
        };
        let text = render(&panel, now, Duration::from_secs(5));
        assert!(text.contains("Server IP: 10.11.11.11"));
        assert!(text.contains("CPU: 42.50 %"));
        assert!(text.contains("Memory: n/a"));
        assert!(text.contains("Disk: 10.00 %"));
        assert!(!text.contains("(stale)"));

        let later = render(&panel, now + Duration::from_secs(6), Duration::from_secs(5));
        assert!(later.contains("(stale)"));
    }

    #[test]
    fn test_zero_is_shown_as_zero() {
        let now = Instant::now();
        let panel = Panel::Live {
            host: server_1(),
            snapshot: MetricSnapshot::new(Some(0.0), Some(0.0), Some(0.0)),
            received_at: now,
        };
        let text = render(&panel, now, Duration::from_secs(5));
        assert!(text.contains("CPU: 0.00 %"));
        assert!(!text.contains("n/a"));
    }

    #[test]
    fn test_watch_sink_keeps_latest_panel() {
        let (sink, rx) = WatchSink::new();
        assert_eq!(*rx.borrow(), Panel::Welcome);

        let host = server_1();
        sink.host_selected(&host);
        sink.snapshot(&host, MetricSnapshot::new(Some(1.0), None, None));
        sink.snapshot(&host, MetricSnapshot::new(Some(2.0), None, None));
        assert!(matches!(&*rx.borrow(), Panel::Live { snapshot, .. } if snapshot.cpu == Some(2.0)));

        sink.host_failed(&host, "timed out");
        let text = render(&rx.borrow(), Instant::now(), Duration::from_secs(5));
        assert!(text.contains("Feed unavailable: timed out"));

        sink.cleared();
        assert_eq!(*rx.borrow(), Panel::Welcome);
    }
}
