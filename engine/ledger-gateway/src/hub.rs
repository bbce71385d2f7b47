//! Connection registry and answer fan-out
//!
//! The hub never touches a socket. It holds a cloneable handle per live
//! connection (its outbound queue and cancellation token) and pushes
//! serialized answers onto those queues; each connection's send loop does the
//! actual writing.

use crate::error::GatewayResult;
use crate::metrics::GatewayMetrics;
use crate::outbound_queue::{OutboundQueue, PushOutcome};
use dashmap::DashMap;
use ledger::{Answer, Ledger};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Identifier assigned to each accepted connection
pub type ConnectionId = u64;

/// The hub's view of a connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub peer_addr: SocketAddr,
    pub queue: Arc<OutboundQueue>,
    pub token: CancellationToken,
}

impl ConnectionHandle {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        queue: Arc<OutboundQueue>,
        token: CancellationToken,
    ) -> Self {
        Self { id, peer_addr, queue, token }
    }

    /// Close both loops of this connection
    pub fn close(&self) {
        self.token.cancel();
    }
}

/// Registry of live connections
pub struct Hub {
    connections: DashMap<ConnectionId, ConnectionHandle>,
    metrics: Arc<GatewayMetrics>,
}

impl Hub {
    pub fn new(metrics: Arc<GatewayMetrics>) -> Self {
        Self { connections: DashMap::new(), metrics }
    }

    /// Add a connection and queue the full ledger for it
    ///
    /// Call this while holding the processor's ledger lock (see
    /// [`ledger::EventProcessor::with_ledger`]) so no answer can slip between
    /// the snapshot and the registration.
    pub fn register(&self, handle: ConnectionHandle, snapshot: &Ledger) -> GatewayResult<()> {
        let payload = Answer::AllData { data: snapshot.clone() }.to_json()?;
        handle.queue.push(WsMessage::Text(payload));

        info!(connection_id = handle.id, peer = %handle.peer_addr, "Connection registered");
        self.connections.insert(handle.id, handle);
        Ok(())
    }

    /// Remove a connection; unknown or already removed ids are ignored
    pub fn deregister(&self, id: ConnectionId) -> bool {
        match self.connections.remove(&id) {
            Some((_, handle)) => {
                info!(connection_id = id, peer = %handle.peer_addr, "Connection deregistered");
                true
            }
            None => false,
        }
    }

    /// Queue `answer` on every registered connection, the sender included
    ///
    /// Returns the number of connections the answer was queued for.
    pub fn broadcast(&self, answer: &Answer) -> usize {
        let payload = match answer.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize {} answer: {}", answer.kind(), e);
                return 0;
            }
        };

        // Iterate a copy so overflow handling can remove entries
        let handles: Vec<ConnectionHandle> =
            self.connections.iter().map(|entry| entry.value().clone()).collect();

        let mut delivered = 0;
        for handle in &handles {
            if self.enqueue(handle, WsMessage::Text(payload.clone())) {
                delivered += 1;
            }
        }

        self.metrics.messages_broadcast.add(delivered as u64);
        debug!(kind = answer.kind(), delivered, "Broadcast answer");
        delivered
    }

    /// Queue `answer` on a single connection
    pub fn send_to(&self, id: ConnectionId, answer: &Answer) -> bool {
        let Some(handle) = self.connections.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };

        match answer.to_json() {
            Ok(payload) => self.enqueue(&handle, WsMessage::Text(payload)),
            Err(e) => {
                error!("Failed to serialize {} answer: {}", answer.kind(), e);
                false
            }
        }
    }

    /// Cancel every registered connection
    pub fn close_all(&self) {
        let count = self.connections.len();
        for entry in self.connections.iter() {
            entry.value().close();
        }
        info!("Closing {} connections", count);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // Private methods

    fn enqueue(&self, handle: &ConnectionHandle, message: WsMessage) -> bool {
        match handle.queue.push(message) {
            PushOutcome::Queued => true,
            PushOutcome::DroppedOldest => {
                self.metrics.messages_dropped.inc();
                true
            }
            PushOutcome::Overflow => {
                warn!(
                    connection_id = handle.id,
                    peer = %handle.peer_addr,
                    capacity = handle.queue.capacity(),
                    "Outbound queue full, disconnecting slow client"
                );
                self.metrics.messages_dropped.inc();
                self.metrics.slow_consumer_disconnects.inc();
                handle.close();
                self.deregister(handle.id);
                false
            }
        }
    }
}
