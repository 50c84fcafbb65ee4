//! Self-registration with the directory
//!
//! The directory owns the host-to-topic mapping, so a collector with a
//! `[registration]` section asks it for the topic instead of deriving one.

use hoststat_core::{HostId, HostRecord, HostView};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{CollectorConfig, RegistrationConfig};

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("directory unreachable: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory answered {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Topic to publish on. Registration problems are logged and the locally
/// configured namespace is used instead.
pub async fn resolve_topic(client: &reqwest::Client, cfg: &CollectorConfig) -> String {
    let Some(reg) = &cfg.registration else {
        return cfg.topic();
    };
    match register(client, reg, cfg.host_id).await {
        Ok(view) => view.topic,
        Err(e) => {
            let fallback = cfg.topic();
            warn!("registration with {} failed: {e}; publishing on {fallback}", reg.directory_url);
            fallback
        }
    }
}

/// Registers this host; an id that is already taken counts as registered
/// and its existing entry is returned.
pub async fn register(
    client: &reqwest::Client,
    reg: &RegistrationConfig,
    host_id: HostId,
) -> Result<HostView, RegistrationError> {
    let base = reg.directory_url.trim_end_matches('/');
    let record = local_record(reg, host_id);

    let resp = client.post(format!("{base}/servers")).json(&record).send().await?;
    match resp.status() {
        StatusCode::CREATED => {
            let view: HostView = resp.json().await?;
            info!(id = host_id, topic = %view.topic, "registered with directory");
            Ok(view)
        }
        StatusCode::CONFLICT => {
            let resp = client.get(format!("{base}/servers/{host_id}")).send().await?;
            if !resp.status().is_success() {
                return Err(rejected(resp).await);
            }
            let view: HostView = resp.json().await?;
            info!(id = host_id, topic = %view.topic, "already registered");
            Ok(view)
        }
        _ => Err(rejected(resp).await),
    }
}

async fn rejected(resp: reqwest::Response) -> RegistrationError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    RegistrationError::Rejected { status, body }
}

fn local_record(reg: &RegistrationConfig, host_id: HostId) -> HostRecord {
    let name = reg.name.clone().unwrap_or_else(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| format!("host-{host_id}"))
    });
    let ip = reg.ip.clone().unwrap_or_else(|| {
        local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "127.0.0.1".into())
    });
    HostRecord::new(host_id, name, ip, reg.desc.clone())
}
