mod api;
mod config;
mod dashboard;
mod error;
mod nse;
mod snapshot;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::dashboard::Renderer;
use crate::error::Result;
use crate::nse::NseClient;
use crate::snapshot::SnapshotBuilder;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Upstream client ---
    let client = NseClient::new(&cfg)?;
    info!("NSE market data from {}", cfg.nse_base_url);
    match cfg.upstream_timeout {
        Some(t) => info!("Upstream timeout {}s", t.as_secs()),
        None => warn!("UPSTREAM_TIMEOUT_SECS not set; a hung NSE call blocks its request indefinitely"),
    }

    // --- Snapshot pipeline ---
    let builder = SnapshotBuilder::new(Arc::new(client), cfg.fetch_policy);
    info!("Fetch policy: {:?}", builder.policy());

    let renderer = Renderer::new()?;

    // --- HTTP server ---
    if !std::path::Path::new(&cfg.static_dir).is_dir() {
        warn!("STATIC_DIR {} does not exist; /static will return 404", cfg.static_dir);
    }
    let app = router(ApiState::new(builder, renderer), &cfg.static_dir);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Dashboard listening on http://{bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
