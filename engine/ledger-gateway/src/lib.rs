//! LedgerGateway - WebSocket fan-out of shared ledger updates
//!
//! This module provides the client-facing side of the ledger broadcaster:
//! accepting WebSocket connections, running the heartbeat protocol, feeding
//! inbound events to the [`ledger::EventProcessor`] and broadcasting every
//! resulting answer to all connected clients.

pub mod config;
pub mod connection;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod metrics;
pub mod outbound_queue;


pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::LedgerGateway;
pub use hub::{ConnectionHandle, ConnectionId, Hub};
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use outbound_queue::{BackpressurePolicy, OutboundQueue, PushOutcome};

/// Default WebSocket port
pub const DEFAULT_PORT: u16 = 8080;

/// Default endpoint path upgraded to a WebSocket
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Default maximum connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 10000;

/// Default time a client has to answer a ping, in seconds
pub const DEFAULT_PONG_WAIT_SECS: u64 = 30;

/// Default per-connection outbound queue capacity
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;
