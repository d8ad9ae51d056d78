//! Scryptex Core Service
//!
//! Main entry point for the Scryptex dashboard core.
//! This service provides:
//! - Credit ledger, notifications and user profile over a persistent store
//! - Simulated testnet farming runs
//! - WebSocket gateway for commands and live change events

use anyhow::Context;
use scryptex_core::clock::{Clock, SystemClock};
use scryptex_core::store::JsonStore;
use scryptex_core::websocket::WebSocketServer;
use scryptex_core::{AppConfig, AppError, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("scryptex_core={},tokio_tungstenite=warn", config.log_level).into()
            }),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Scryptex Core Service Starting                 ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // STORE SETUP
    // =========================================================================
    info!("Opening {:?} store...", config.store.backend);

    let store = JsonStore::open(&config.store)
        .with_context(|| format!("failed to open store at {:?}", config.store.path))?;

    info!("✓ Store ready");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let app_state = AppState::new(&config, store, clock);
    info!("✓ Application state initialized");
    info!(
        "Starting balance: {} credits, farming cost: {}",
        app_state.ledger.balance()?,
        config.ledger.farming_cost
    );

    if !app_state.store.tutorial_seen()? {
        info!("Tutorial has not been dismissed yet");
    }

    // =========================================================================
    // START SERVERS
    // =========================================================================
    let ws_handle = if let Some(ws_port) = config.ws_port {
        let ws_addr: SocketAddr = format!("0.0.0.0:{}", ws_port)
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid WebSocket address: {}", e)))?;

        info!("Starting WebSocket server on {}...", ws_addr);

        let ws_server = WebSocketServer::new(app_state.clone());
        let listener = TcpListener::bind(ws_addr)
            .await
            .with_context(|| format!("failed to bind WebSocket server on {}", ws_addr))?;

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from {}", addr);
                        let ws = ws_server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = ws.handle_connection(stream).await {
                                error!("WebSocket connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("WebSocket accept error: {}", e);
                    }
                }
            }
        });

        info!("✓ WebSocket server started on {}", ws_addr);
        Some(handle)
    } else {
        warn!("WS_PORT not configured - WebSocket server not started");
        None
    };

    // =========================================================================
    // READY
    // =========================================================================
    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Scryptex Core Service Ready!                   ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    if let Some(ws_port) = config.ws_port {
        info!("║  WebSocket:    0.0.0.0:{}                              ║", ws_port);
    }
    info!("║  Environment:  {}                                    ║", config.environment);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = async {
            if let Some(handle) = ws_handle {
                handle.await.ok();
            } else {
                // Never completes if WebSocket is not running
                futures::future::pending::<()>().await;
            }
        } => {
            error!("WebSocket server exited unexpectedly");
        }
    }

    if app_state.farming.is_active().await {
        warn!("Shutting down with a farming run in progress; it will not resume");
    }

    info!("Scryptex core service shutdown complete");
    Ok(())
}
