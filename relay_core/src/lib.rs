//! Core library for the share-code file relay: registry, storage, transfer
//! lifecycle and the HTTP handlers that expose them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod registry;
pub mod storage;
pub mod transfer;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use handlers::routes::create_routes;
pub use registry::{CodeAlphabet, CodeGenerator, CodeRegistry, ShareEntry};
pub use storage::FileStorage;
pub use transfer::{spawn_sweeper, SweepReport, TransferService};

pub use middleware::cors::{cors_layer_from_config, cors_layer_permissive};
pub use middleware::logging::logging_layer;

use axum::Router;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub transfers: TransferService,
}

impl AppState {
    pub fn new(transfers: TransferService) -> Self {
        Self {
            app_name: "Share Relay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            transfers,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(TransferService::from_config(config))
    }
}

pub fn create_app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .merge(create_routes(config.storage.max_upload_bytes))
        .layer(cors_layer_from_config(&config.cors))
        .layer(logging_layer())
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
