use serde::{Deserialize, Serialize};

/// MQTT broker connection settings shared by the collector and the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: None,
            keep_alive_secs: 15,
        }
    }
}

impl BrokerConfig {
    /// Client id to use, falling back to `<prefix>-<pid>` so two processes on
    /// one machine do not kick each other off the broker.
    pub fn client_id_or(&self, prefix: &str) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", prefix, std::process::id()))
    }
}
