//! Main LedgerGateway implementation

use crate::config::GatewayConfig;
use crate::connection::Connection;
use crate::error::{GatewayError, GatewayResult};
use crate::hub::{ConnectionId, Hub};
use crate::metrics::GatewayMetrics;

use ledger::EventProcessor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Main LedgerGateway service
pub struct LedgerGateway {
    /// Gateway configuration
    config: Arc<GatewayConfig>,

    /// Applies inbound events to the shared ledger
    processor: Arc<EventProcessor>,

    /// Registry of live connections
    hub: Arc<Hub>,

    metrics: Arc<GatewayMetrics>,

    /// Root of every connection's cancellation token
    shutdown: CancellationToken,

    next_connection_id: AtomicU64,
}

impl LedgerGateway {
    /// Create a new LedgerGateway
    pub fn new(config: GatewayConfig, processor: Arc<EventProcessor>) -> Self {
        let metrics = Arc::new(GatewayMetrics::new());
        let hub = Arc::new(Hub::new(metrics.clone()));

        Self {
            config: Arc::new(config),
            processor,
            hub,
            metrics,
            shutdown: CancellationToken::new(),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Bind the configured address
    pub async fn bind(&self) -> GatewayResult<TcpListener> {
        self.config.validate().map_err(GatewayError::Config)?;

        let addr = self
            .config
            .server_addr()
            .map_err(|e| GatewayError::Config(format!("Invalid server address: {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        info!("LedgerGateway listening on {}{}", listener.local_addr()?, self.config.ws_path);
        Ok(listener)
    }

    /// Bind and serve until [`LedgerGateway::stop`] is called
    pub async fn start(&self) -> GatewayResult<()> {
        let listener = self.bind().await?;
        self.run(listener).await
    }

    /// Accept connections on `listener` until shutdown, then wait for every
    /// connection task to finish
    pub async fn run(&self, listener: TcpListener) -> GatewayResult<()> {
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task panicked: {}", e);
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        let at_capacity = connections.len() >= self.config.max_connections;
                        let task = self.connection_task(stream, peer_addr, at_capacity);
                        connections.spawn(task);
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
            }
        }

        info!("LedgerGateway stopped accepting, draining {} connections", connections.len());
        self.hub.close_all();
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!("Connection task panicked: {}", e);
            }
        }

        info!("LedgerGateway stopped");
        Ok(())
    }

    /// Stop accepting and close every connection
    pub fn stop(&self) {
        info!("Stopping LedgerGateway...");
        self.shutdown.cancel();
        self.hub.close_all();
    }

    pub fn hub(&self) -> Arc<Hub> {
        self.hub.clone()
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Get the number of registered connections
    pub fn connection_count(&self) -> usize {
        self.hub.connection_count()
    }

    /// Build the task that upgrades and drives one accepted socket
    fn connection_task(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        at_capacity: bool,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let id: ConnectionId = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let config = self.config.clone();
        let connection = Connection::new(
            id,
            peer_addr,
            &self.shutdown,
            &config,
            self.hub.clone(),
            self.processor.clone(),
            self.metrics.clone(),
        );
        let metrics = self.metrics.clone();

        async move {
            debug!(connection_id = id, peer = %peer_addr, "Accepted TCP connection");

            let ws_path = config.ws_path.clone();
            let callback = move |request: &Request, response: Response| {
                check_upgrade(request, response, &ws_path, at_capacity)
            };

            let handshake = tokio_tungstenite::accept_hdr_async(stream, callback);
            let ws_stream = match tokio::time::timeout(config.handshake_timeout(), handshake).await {
                Ok(Ok(ws_stream)) => ws_stream,
                Ok(Err(e)) => {
                    metrics.connections_rejected.inc();
                    warn!(connection_id = id, peer = %peer_addr, "WebSocket handshake failed: {}", e);
                    return;
                }
                Err(_) => {
                    metrics.connections_rejected.inc();
                    warn!(connection_id = id, peer = %peer_addr, "WebSocket handshake timed out");
                    return;
                }
            };

            info!(connection_id = id, peer = %peer_addr, "WebSocket connection established");
            if let Err(e) = connection.run(ws_stream).await {
                error!(connection_id = id, "Connection error: {}", e);
            }
        }
    }
}

/// Handshake callback: only the configured path is upgraded
fn check_upgrade(
    request: &Request,
    response: Response,
    ws_path: &str,
    at_capacity: bool,
) -> Result<Response, ErrorResponse> {
    if request.uri().path() != ws_path {
        debug!("Rejecting upgrade for path {}", request.uri().path());
        return Err(error_response(StatusCode::NOT_FOUND, "not found"));
    }

    if at_capacity {
        warn!("Connection limit reached, rejecting upgrade");
        return Err(error_response(StatusCode::SERVICE_UNAVAILABLE, "connection limit reached"));
    }

    Ok(response)
}

fn error_response(status: StatusCode, body: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(body.to_string()));
    *response.status_mut() = status;
    response
}
