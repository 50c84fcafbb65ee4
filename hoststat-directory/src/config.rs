use hoststat_core::{HostRecord, TopicScheme};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV: &str = "HOSTSTAT_DIRECTORY_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DirectoryConfig {
    pub listen: SocketAddr,
    pub namespace: TopicScheme,
    /// Hosts registered at startup, in order.
    pub hosts: Vec<HostRecord>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8181)),
            namespace: TopicScheme::default(),
            hosts: Vec::new(),
        }
    }
}

impl DirectoryConfig {
    pub fn from_yaml(txt: &str) -> Result<Self, serde_yaml::Error> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt)
    }
}

/// Reads the YAML file named by `HOSTSTAT_DIRECTORY_CONFIG` (default
/// `directory.yaml`). A missing or invalid file falls back to defaults.
pub async fn load_config() -> DirectoryConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| "directory.yaml".into());
    load_config_from(&path).await
}

pub async fn load_config_from(path: impl AsRef<Path>) -> DirectoryConfig {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "no config file, using defaults");
        return DirectoryConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!(path = %path.display(), "config unreadable: {e}");
            return DirectoryConfig::default();
        }
    };
    DirectoryConfig::from_yaml(&txt).unwrap_or_else(|e| {
        warn!(path = %path.display(), "invalid config: {e}");
        DirectoryConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let cfg = DirectoryConfig::from_yaml(
            r#"
listen: "127.0.0.1:9000"
namespace: "lab.stats"
hosts:
  - id: 1
    name: "Server 1"
    ip: "10.11.11.11"
    desc: "This is server 1"
  - id: 2
    name: "Server 2"
    ip: "10.12.12.12"
"#,
        )
        .unwrap();

        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.namespace.topic_for(2), "lab.stats.2");
        assert_eq!(cfg.hosts.len(), 2);
        assert_eq!(cfg.hosts[1].desc, "");
    }

    #[test]
    fn test_empty_and_partial_config() {
        let cfg = DirectoryConfig::from_yaml("  \n").unwrap();
        assert_eq!(cfg.listen.port(), 8181);
        assert!(cfg.hosts.is_empty());

        let cfg = DirectoryConfig::from_yaml("namespace: edge\n").unwrap();
        assert_eq!(cfg.namespace.namespace(), "edge");
        assert_eq!(cfg.listen.port(), 8181);
    }

    #[test]
    fn test_invalid_namespace_is_an_error() {
        assert!(DirectoryConfig::from_yaml("namespace: \"a/#\"\n").is_err());
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let cfg = load_config_from("/definitely/not/here.yaml").await;
        assert_eq!(cfg.listen.port(), 8181);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: [not, an, address]").unwrap();
        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.listen.port(), 8181);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: \"127.0.0.1:8282\"").unwrap();
        let cfg = load_config_from(file.path()).await;
        assert_eq!(cfg.listen.port(), 8282);
    }
}
