//! Prices Server - Main entry point

use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use prices_common::logging::{init_logging, LogConfig};
use tokio::signal;
use tracing::info;

use prices_server::{api, catalog, config::Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("prices-server".to_string())
        .filter_directives("prices_server=debug,tower_http=debug,sqlx=warn".to_string())
        .build()
        .with_env_overrides()?;

    init_logging(&log_config)?;

    info!("Starting prices server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        backend = ?config.catalog,
        "Configuration loaded"
    );

    let store = catalog::connect(config.catalog, &config.database).await?;
    info!("Catalog ready");

    let app = api::router(store, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
