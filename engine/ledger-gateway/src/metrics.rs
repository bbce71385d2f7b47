// Metrics collection for the LedgerGateway

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Connection and fan-out counters for the gateway
#[derive(Debug)]
pub struct GatewayMetrics {
    // Connection lifecycle
    pub connections_opened: AtomicCounter,
    pub connections_closed: AtomicCounter,
    pub connections_rejected: AtomicCounter,
    pub heartbeat_timeouts: AtomicCounter,

    // Message flow
    pub messages_received: AtomicCounter,
    pub messages_rejected: AtomicCounter,
    pub messages_broadcast: AtomicCounter,
    pub messages_dropped: AtomicCounter,
    pub slow_consumer_disconnects: AtomicCounter,

    pub started_at: Instant,
}

/// Point-in-time copy of [`GatewayMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_opened: u64,
    pub connections_closed: u64,
    pub connections_rejected: u64,
    pub heartbeat_timeouts: u64,
    pub messages_received: u64,
    pub messages_rejected: u64,
    pub messages_broadcast: u64,
    pub messages_dropped: u64,
    pub slow_consumer_disconnects: u64,
    pub uptime_secs: u64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicCounter::new(),
            connections_closed: AtomicCounter::new(),
            connections_rejected: AtomicCounter::new(),
            heartbeat_timeouts: AtomicCounter::new(),
            messages_received: AtomicCounter::new(),
            messages_rejected: AtomicCounter::new(),
            messages_broadcast: AtomicCounter::new(),
            messages_dropped: AtomicCounter::new(),
            slow_consumer_disconnects: AtomicCounter::new(),
            started_at: Instant::now(),
        }
    }

    /// Connections opened and not yet closed
    pub fn connections_active(&self) -> u64 {
        self.connections_opened.get().saturating_sub(self.connections_closed.get())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_opened: self.connections_opened.get(),
            connections_closed: self.connections_closed.get(),
            connections_rejected: self.connections_rejected.get(),
            heartbeat_timeouts: self.heartbeat_timeouts.get(),
            messages_received: self.messages_received.get(),
            messages_rejected: self.messages_rejected.get(),
            messages_broadcast: self.messages_broadcast.get(),
            messages_dropped: self.messages_dropped.get(),
            slow_consumer_disconnects: self.slow_consumer_disconnects.get(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Emit the current counters as one structured log line
    pub fn log_summary(&self) {
        let s = self.snapshot();
        tracing::info!(
            connections_opened = s.connections_opened,
            connections_closed = s.connections_closed,
            connections_rejected = s.connections_rejected,
            heartbeat_timeouts = s.heartbeat_timeouts,
            messages_received = s.messages_received,
            messages_rejected = s.messages_rejected,
            messages_broadcast = s.messages_broadcast,
            messages_dropped = s.messages_dropped,
            slow_consumer_disconnects = s.slow_consumer_disconnects,
            uptime_secs = s.uptime_secs,
            "Gateway metrics"
        );
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic counter
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
