//! Red Light Game Server - camera-driven red light / green light
//!
//! This is the main entry point for the game server. It handles:
//! - Frame ingest from the capture client
//! - The game engine (phase countdown and color tracking)
//! - HTTP and WebSocket endpoints for the render/UI layer

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redlight_game_server::app::AppState;
use redlight_game_server::config::Config;
use redlight_game_server::http::build_router;
use redlight_game_server::util::time::init_server_time;

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

    info!("Starting Red Light Game Server");
    info!("Server address: {}", config.server_addr);
    info!(
        width = config.frame_width,
        height = config.frame_height,
        tracking_fps = config.tracking_fps,
        difficulty = ?config.default_difficulty,
        "Capture and game settings"
    );

    // Create application state
    let state = AppState::new(config.clone());

    // Spawn game engine
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let engine = tokio::spawn(state.engine().run(shutdown_rx));

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the engine after the last request is done
    let _ = shutdown_tx.send(());
    engine.await?;

    info!("Server shutdown complete");
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

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
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
