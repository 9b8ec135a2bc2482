//! Maternal health prediction server
//!
//! Loads (or trains) both predictors at startup, then serves the HTTP API
//! until interrupted.

use anyhow::Result;
use predictor_lib::{predictor::LoadOutcome, ServiceRegistry, StructuredLogger};
use prediction_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn describe(outcome: &LoadOutcome) -> String {
    match outcome {
        LoadOutcome::Loaded { version } => format!("loaded {version}"),
        LoadOutcome::Retrained { report, .. } => format!("trained {}", report.model_version),
        LoadOutcome::Failed { error, .. } => format!("unavailable ({error})"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting prediction server");

    let config = ServerConfig::load()?;
    info!(
        addr = %config.bind_addr(),
        model_dir = %config.model_dir.display(),
        n_estimators = config.n_estimators,
        "Server configured"
    );

    let registry = ServiceRegistry::new(config.registry_config())?;
    registry.refresh_health().await;

    // Loading may train from scratch, which is CPU-bound
    let startup = {
        let registry = registry.clone();
        tokio::task::spawn_blocking(move || registry.initialize()).await?
    };
    registry.refresh_health().await;
    if !startup.all_ready() {
        warn!("At least one predictor failed to initialize; its endpoints will return 503");
    }

    let logger = StructuredLogger::new("maternal-predictor");
    logger.log_startup(
        api::SERVICE_VERSION,
        &describe(&startup.baby_weight),
        &describe(&startup.diabetes),
    );

    let app_state = Arc::new(api::AppState::new(registry));
    let app = api::create_router(app_state, &config.cors_origins);
    api::serve(&config.bind_addr(), app, shutdown_signal()).await?;

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
