use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use facecap_core::CascadeDetector;
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod http;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "facecapd starting");

    let config = config::Config::from_env();
    tracing::debug!(model_dir = %config.model_dir.display(), "configuration loaded");

    facecap_models::verify_file_sha256(
        facecap_core::CASCADE_FILE,
        &config.cascade_path,
        config.cascade_sha256.as_deref(),
    )
    .context("cascade check failed; run `facecap setup` to download it")?;

    let detector = CascadeDetector::from_file(
        &config.cascade_path,
        config.pipeline.scale_factor,
        config.pipeline.min_neighbors,
    )
    .with_context(|| format!("failed to load cascade {}", config.cascade_path.display()))?;
    tracing::info!(
        path = %config.cascade_path.display(),
        scale_factor = detector.scale_factor(),
        min_neighbors = detector.min_neighbors(),
        "face detector loaded"
    );

    let engine = engine::spawn_engine(Box::new(detector), config.pipeline.clone())?;

    let state = Arc::new(http::AppState {
        engine,
        verify_timeout: Duration::from_secs(config.verify_timeout_secs),
        cascade_path: config.cascade_path.clone(),
    });
    let app = http::router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        capture_dir = %config.pipeline.capture_dir.display(),
        brightness_threshold = config.pipeline.brightness_threshold,
        blur_threshold = config.pipeline.blur_threshold,
        "facecapd ready"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("facecapd shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
