//! Snake Duel Relay
//!
//! Routes JOIN / MOVE / STATE / LEAVE messages between the two peers of
//! each match. Never simulates; the host peer is authoritative.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snake_duel::config::RelayConfig;
use snake_duel::network::RelayServer;
use snake_duel::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = RelayConfig::from_env()?;
    init_tracing(&config.log_level);

    info!("Snake Duel Relay v{}", VERSION);
    info!("Max connections: {}", config.max_connections);

    let server = Arc::new(RelayServer::new(config));
    let listener = server.bind().await?;

    let running = server.clone();
    let serve = tokio::spawn(async move { running.serve(listener).await });

    shutdown_signal().await;
    server.shutdown();

    match serve.await {
        Ok(result) => result?,
        Err(e) => error!("Relay task failed: {}", e),
    }

    info!("Relay shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
