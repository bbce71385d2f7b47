//! Configuration for the LedgerGateway

use crate::outbound_queue::BackpressurePolicy;
use crate::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_OUTBOUND_CAPACITY, DEFAULT_PONG_WAIT_SECS, DEFAULT_PORT,
    DEFAULT_WS_PATH,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main configuration for the LedgerGateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Request path upgraded to a WebSocket; anything else gets a 404
    pub ws_path: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Time a client has to answer a ping before it is disconnected, in seconds
    pub pong_wait_secs: u64,

    /// Time allowed for the WebSocket handshake, in seconds
    pub handshake_timeout_secs: u64,

    /// Maximum queued outbound messages per connection
    pub outbound_capacity: usize,

    /// What to do when a connection's outbound queue is full
    pub backpressure_policy: BackpressurePolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            ws_path: DEFAULT_WS_PATH.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            pong_wait_secs: DEFAULT_PONG_WAIT_SECS,
            handshake_timeout_secs: 10,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            backpressure_policy: BackpressurePolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Get the server address
    pub fn server_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Read deadline extended by every pong
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    /// Interval between pings; 90% of the pong wait
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if let Err(e) = self.server_addr() {
            return Err(format!("Invalid server address {}:{}: {e}", self.host, self.port));
        }

        if !self.ws_path.starts_with('/') {
            return Err(format!("ws_path must start with '/', got '{}'", self.ws_path));
        }

        if self.pong_wait_secs == 0 {
            return Err("pong_wait_secs must be greater than 0".to_string());
        }

        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be greater than 0".to_string());
        }

        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        Ok(())
    }
}
