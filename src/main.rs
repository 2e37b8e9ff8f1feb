mod aggregate;
mod api;
mod config;
mod error;
mod fetcher;
mod normalize;
mod refresher;
mod types;
mod view;

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::SnapshotFetcher;
use crate::refresher::SnapshotRefresher;
use crate::view::{ViewSettings, ViewState};

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
    let views = ViewState::new(ViewSettings {
        guess_bin_width: cfg.guess_bin_width,
        kde_grid_points: cfg.kde_grid_points,
    });
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    match &cfg.meta_url {
        Some(meta_url) => info!("Polling {} every {:?} (content id from {meta_url})", cfg.data_url, cfg.poll_interval),
        None => info!("Polling {} every {:?} (content id from body digest)", cfg.data_url, cfg.poll_interval),
    }

    // Snapshot refresher (background, first poll immediately)
    let refresher = SnapshotRefresher::new(
        cfg.poll_interval,
        SnapshotFetcher::new(cfg.clone())?,
        Arc::clone(&views),
        Arc::clone(&health),
        Arc::clone(&latency),
    );
    tokio::spawn(async move { refresher.run().await });

    // HTTP API server
    let app = router(ApiState {
        views,
        health,
        latency,
        leaderboard_size: cfg.leaderboard_size,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
