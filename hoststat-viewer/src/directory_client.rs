use hoststat_core::{Backoff, HostView};
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DirectoryClientError {
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directory still unreachable after {attempts} attempts: {last}")]
    GaveUp { attempts: u32, last: String },
}

/// Fetches the host list from the directory's `GET /servers`.
pub struct DirectoryClient {
    client: reqwest::Client,
    base: String,
}

impl DirectoryClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list(&self) -> Result<Vec<HostView>, DirectoryClientError> {
        let hosts = self
            .client
            .get(format!("{}/servers", self.base))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(hosts)
    }

    /// Retries `list` until it succeeds or `attempts` run out, sleeping for
    /// the backoff delay in between.
    pub async fn list_with_retry(
        &self,
        attempts: u32,
        mut backoff: Backoff,
    ) -> Result<Vec<HostView>, DirectoryClientError> {
        let mut last = String::new();
        for attempt in 1..=attempts.max(1) {
            match self.list().await {
                Ok(hosts) => return Ok(hosts),
                Err(e) => {
                    last = e.to_string();
                    if attempt < attempts {
                        let delay = backoff.mark_failure(Instant::now());
                        warn!("{last} (attempt {attempt}/{attempts}), retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        Err(DirectoryClientError::GaveUp { attempts, last })
    }
}
