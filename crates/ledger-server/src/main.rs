//! Ledger Server
//!
//! HTTP front end for the ledger engine: accepts an uploaded CSV trade ledger
//! and returns its PnL summary, chart series and normalized rows as JSON.

mod api;
mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledger_server=info,ledger_core=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .init();

    // Load configuration
    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    config
        .analysis
        .ingest_options()
        .map_err(|e| anyhow::anyhow!("Invalid analysis config: {}", e))?;

    if config.analysis.histogram_bins > config.analysis.max_histogram_bins {
        anyhow::bail!(
            "Invalid analysis config: histogram_bins {} exceeds max_histogram_bins {}",
            config.analysis.histogram_bins,
            config.analysis.max_histogram_bins
        );
    }

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        max_upload_bytes = config.server.max_upload_bytes,
        fee_mode = %config.analysis.fee_mode,
        fee_percent = config.analysis.fee_percent,
        histogram_bins = config.analysis.histogram_bins,
        "Starting Ledger Server"
    );

    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let app = Router::new()
        .merge(api::create_router())
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
