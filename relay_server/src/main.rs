//! Main entry point for the share relay server binary

use anyhow::Result;
use relay_core::{create_app, run_server, spawn_sweeper, AppConfig, AppState};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Upload directory: {}", config.storage.upload_dir.display());

    config.create_directories()
        .map_err(|e| anyhow::anyhow!("Failed to create directories: {}", e))?;

    let addr: SocketAddr = config.bind_address().parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let state = AppState::from_config(&config);
    state.transfers.initialize().await
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage: {}", e))?;

    info!("App: {} v{}", state.app_name, state.version);
    info!(
        max_upload_bytes = config.storage.max_upload_bytes,
        retention_secs = config.sweep.retention_seconds,
        code_length = config.codes.length,
        "Share relay ready"
    );

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        state.transfers.clone(),
        config.sweep.interval(),
        shutdown.clone(),
    );

    let app = create_app(state, &config);
    let served = run_server(app, addr).await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Sweeper task ended abnormally: {}", e);
    }

    served?;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            let default_level = if cfg!(debug_assertions) {
                "debug"
            } else {
                "info"
            };

            format!(
                "relay_core={level},{crate_name}={level},tower_http=debug,axum=debug",
                level = default_level,
                crate_name = env!("CARGO_CRATE_NAME").replace('-', "_"),
            ).into()
        });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
