use anyhow::{Context, Result};
use hoststat_directory::config::load_config;
use hoststat_directory::{http, Directory};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();
    hoststat_core::logging::init("info");

    let cfg = load_config().await;
    let directory = Directory::with_hosts(cfg.namespace, cfg.hosts)
        .context("invalid seed hosts in config")?;
    info!(
        hosts = directory.len(),
        namespace = directory.topics().namespace(),
        "directory ready"
    );

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    info!("listening on http://{}", cfg.listen);

    http::serve(listener, directory, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
    })
    .await
    .context("HTTP server failed")?;

    Ok(())
}
