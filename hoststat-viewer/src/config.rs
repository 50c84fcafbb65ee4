use anyhow::{Context, Result};
use hoststat_core::BrokerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV: &str = "HOSTSTAT_VIEWER_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub directory_url: String,
    pub subscribe_timeout_ms: u64,
    /// A live panel with no snapshot for this long is marked stale.
    pub stale_after_ms: u64,
    pub broker: BrokerConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            directory_url: "http://localhost:8181".into(),
            subscribe_timeout_ms: 5000,
            stale_after_ms: 5000,
            broker: BrokerConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn subscribe_timeout(&self) -> Duration {
        Duration::from_millis(self.subscribe_timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    /// `HOSTSTAT_VIEWER_CONFIG`, else `viewer.toml` in the working directory.
    pub async fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "viewer.toml".into());
        Self::load_from(Path::new(&path)).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid config in {}", path.display()))
    }
}
