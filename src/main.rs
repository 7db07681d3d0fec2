//! Boss Battle Relay server
//!
//! Accepts WebSocket clients on `/` and `/ws`, registers unique player
//! names and relays combat events between everyone connected.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use boss_battle_relay::app::AppState;
use boss_battle_relay::config::Config;
use boss_battle_relay::http::build_router;
use boss_battle_relay::init_tracing;
use boss_battle_relay::relay::{RelayHub, RelaySettings};
use boss_battle_relay::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Boss Battle Relay");
    info!("Server address: {}", config.server_addr);

    // Spawn the relay hub; it owns every peer and the game snapshot
    let (hub, relay) = RelayHub::new(RelaySettings::from(&config));
    tokio::spawn(hub.run());

    let addr: SocketAddr = config.server_addr;
    let state = AppState::new(config, relay);

    // Build router
    let router = build_router(state);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install signal handler");
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
