//! Arena Combat Server - authoritative multiplayer arena shooter backend
//!
//! This is the main entry point for the game server. It handles:
//! - WebSocket connections for real-time gameplay
//! - The fixed-rate arena simulation (hitscan, piercing and projectile weapons)
//! - A health endpoint for deployment checks

mod app;
mod config;
mod game;
mod http;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::weapons::WeaponCatalog;
use crate::game::{Arena, ArenaLoop};
use crate::http::build_router;
use crate::util::time::{init_server_time, unix_millis};
use crate::ws::SessionHub;

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

    info!("Starting Arena Combat Server");
    info!("Server address: {}", config.server_addr);

    let catalog = match &config.weapon_catalog_path {
        Some(path) => WeaponCatalog::load(path)
            .with_context(|| format!("loading weapon catalog from {}", path.display()))?,
        None => WeaponCatalog::default(),
    };
    info!(weapons = catalog.kinds().count(), "Weapon catalog ready");

    let seed = config.arena_seed.unwrap_or_else(unix_millis);
    info!(seed, spawn_points = config.spawn_points.len(), "Arena seeded");

    // Spawn the arena task
    let hub = Arc::new(SessionHub::new());
    let arena = Arena::new(Arc::new(catalog), config.spawn_points.clone(), seed);
    let (arena_loop, arena_handle) = ArenaLoop::new(arena, hub.clone());
    tokio::spawn(arena_loop.run());

    // Create application state
    let state = AppState::new(config.clone(), hub, arena_handle);

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
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
