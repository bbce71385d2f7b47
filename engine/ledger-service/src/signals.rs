//! Signal handling for graceful shutdown

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::service::ServiceState;

/// Setup signal handlers for graceful shutdown
///
/// The receiver yields the name of the first signal received.
pub fn setup_signal_handlers() -> Result<mpsc::Receiver<&'static str>> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel(2);

    // Handle Ctrl+C (SIGINT)
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C signal: {}", e);
                return;
            }

            info!("Ctrl+C signal received");
            let _ = shutdown_tx.send("SIGINT").await;
        });
    }

    // Handle SIGTERM (Unix only)
    #[cfg(unix)]
    {
        use signal_hook::consts::SIGTERM;
        use std::sync::atomic::{AtomicBool, Ordering};

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGTERM, shutdown_flag.clone())?;

        tokio::spawn(async move {
            // Poll for signal
            loop {
                if shutdown_flag.load(Ordering::Relaxed) {
                    info!("SIGTERM signal received");
                    let _ = shutdown_tx.send("SIGTERM").await;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        });
    }

    Ok(shutdown_rx)
}

/// Graceful shutdown handler
///
/// Stops the gateway, waits for its task up to the configured timeout, then
/// flushes the ledger and shuts persistence down.
pub async fn graceful_shutdown(
    service_state: Arc<ServiceState>,
    gateway_handle: Option<JoinHandle<()>>,
) -> Result<()> {
    info!("Starting graceful shutdown...");

    service_state.stop_gateway();

    if let Some(gateway_handle) = gateway_handle {
        let shutdown_timeout =
            Duration::from_secs(service_state.config.service.shutdown_timeout_secs);
        match timeout(shutdown_timeout, gateway_handle).await {
            Ok(Ok(())) => {
                info!("LedgerGateway stopped gracefully");
            }
            Ok(Err(e)) => {
                error!("LedgerGateway task failed: {}", e);
            }
            Err(_) => {
                warn!("LedgerGateway did not stop within timeout, forcing shutdown");
            }
        }
    }

    service_state.shutdown().await?;

    info!("Graceful shutdown complete");
    Ok(())
}
