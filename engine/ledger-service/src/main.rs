//! Ledger Broadcaster Service
//!
//! Entry point: loads configuration, restores the ledger from disk, serves
//! WebSocket clients and shuts down gracefully on Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use ledger_service::{
    config, graceful_shutdown, initialize_logging, load_configuration, setup_signal_handlers,
    CliArgs, ServiceState,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliArgs::parse();

    // Load configuration
    let config = load_configuration(&cli)?;
    if cli.print_config {
        print!("{}", config::to_toml(&config)?);
        return Ok(());
    }

    // Logging next, so everything after is captured
    let _log_guard = initialize_logging(&config.logging)?;

    info!("Starting Ledger Broadcaster v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded successfully");

    // Create service state
    let service_state =
        Arc::new(ServiceState::new(config).await.context("Failed to initialize service")?);
    info!("Service state initialized");

    // Setup signal handlers for graceful shutdown
    let mut shutdown_signal = setup_signal_handlers()?;
    info!("Signal handlers configured");

    // Start the LedgerGateway in a separate task
    let mut gateway_handle = {
        let state = service_state.clone();
        tokio::spawn(async move {
            if let Err(e) = state.start_gateway().await {
                error!("LedgerGateway failed: {:#}", e);
            }
        })
    };

    // Wait for shutdown signal
    info!("Ledger Broadcaster is running. Press Ctrl+C to shutdown gracefully.");
    let gateway_handle = tokio::select! {
        signal = shutdown_signal.recv() => {
            info!("Shutdown signal {} received. Initiating graceful shutdown...", signal.unwrap_or("unknown"));
            Some(gateway_handle)
        }
        _ = &mut gateway_handle => {
            warn!("LedgerGateway exited unexpectedly. Shutting down...");
            None
        }
    };

    graceful_shutdown(service_state, gateway_handle).await?;

    info!("Ledger Broadcaster shutdown complete");
    Ok(())
}
