//! Collector configuration
//!
//! TOML, read from `HOSTSTAT_COLLECTOR_CONFIG` or the OS config directory
//! (`~/.config/hoststat-collector/config.toml` on Linux). Every field has a
//! default, so a missing file is a valid setup for the first host.

use anyhow::{Context, Result};
use hoststat_core::{Backoff, BrokerConfig, HostId, TopicScheme};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "HOSTSTAT_COLLECTOR_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub host_id: HostId,
    pub namespace: TopicScheme,
    pub interval_ms: u64,
    /// Mount point whose usage is reported as `disk`.
    pub disk_mount: PathBuf,
    pub broker: BrokerConfig,
    pub backoff: BackoffConfig,
    /// When set, the collector registers with a directory before publishing
    /// and uses the topic the directory hands back.
    pub registration: Option<RegistrationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub directory_url: String,
    /// Defaults to the machine hostname.
    pub name: Option<String>,
    /// Defaults to the primary local address.
    pub ip: Option<String>,
    #[serde(default)]
    pub desc: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host_id: 1,
            namespace: TopicScheme::default(),
            interval_ms: 1000,
            disk_mount: PathBuf::from("/"),
            broker: BrokerConfig::default(),
            backoff: BackoffConfig::default(),
            registration: None,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
        }
    }
}

impl BackoffConfig {
    pub fn build(&self) -> Backoff {
        Backoff::from_millis(self.initial_ms, self.max_ms)
    }
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn topic(&self) -> String {
        self.namespace.topic_for(self.host_id)
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?).await
    }

    /// A missing file yields the defaults; an unreadable or invalid one is an
    /// error, since publishing under the wrong host id is worse than not
    /// starting.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no collector config, using defaults");
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn config_file_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(dir.join("hoststat-collector").join("config.toml"))
    }
}
