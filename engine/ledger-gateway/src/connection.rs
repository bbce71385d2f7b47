//! A single client's WebSocket and its two I/O loops
//!
//! The receive loop owns the read half: it enforces the read deadline, feeds
//! decoded events to the processor and publishes answers through the hub.
//! The send loop owns the write half and is the only task that ever writes to
//! the socket: queued answers, periodic pings and the final close frame.
//! Both loops stop when the connection's cancellation token fires.

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::hub::{ConnectionHandle, ConnectionId, Hub};
use crate::metrics::GatewayMetrics;
use crate::outbound_queue::OutboundQueue;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use ledger::{Answer, Event, EventProcessor};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why the receive loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Shutdown,
    ClientClosed,
    HeartbeatTimeout,
    TransportError,
}

/// An accepted, upgraded client connection
pub struct Connection {
    handle: ConnectionHandle,
    hub: Arc<Hub>,
    processor: Arc<EventProcessor>,
    metrics: Arc<GatewayMetrics>,
    pong_wait: Duration,
    ping_period: Duration,
}

impl Connection {
    /// Create a connection whose token is a child of `parent`
    pub fn new(
        id: ConnectionId,
        peer_addr: std::net::SocketAddr,
        parent: &CancellationToken,
        config: &GatewayConfig,
        hub: Arc<Hub>,
        processor: Arc<EventProcessor>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        let queue = Arc::new(OutboundQueue::new(config.outbound_capacity, config.backpressure_policy));
        let handle = ConnectionHandle::new(id, peer_addr, queue, parent.child_token());

        Self {
            handle,
            hub,
            processor,
            metrics,
            pong_wait: config.pong_wait(),
            ping_period: config.ping_period(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id
    }

    /// Drive the connection until it closes
    pub async fn run<S>(self, ws_stream: WebSocketStream<S>) -> GatewayResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = self.handle.id;
        let (sink, stream) = ws_stream.split();

        // Snapshot and registration happen under the ledger lock
        let hub = self.hub.clone();
        let handle = self.handle.clone();
        self.processor.with_ledger(move |ledger| hub.register(handle, ledger)).await?;
        self.metrics.connections_opened.inc();
        let registration = Registration::new(self.handle.clone(), self.hub.clone(), self.metrics.clone());

        let send_task = tokio::spawn(send_loop(
            sink,
            self.handle.queue.clone(),
            self.handle.token.clone(),
            self.ping_period,
            id,
        ));

        let reason = self.receive_loop(stream).await;

        drop(registration);
        if let Err(e) = send_task.await {
            warn!(connection_id = id, "Send loop task failed: {}", e);
        }

        info!(connection_id = id, peer = %self.handle.peer_addr, ?reason, "Connection closed");
        Ok(())
    }

    async fn receive_loop<S>(&self, mut stream: SplitStream<WebSocketStream<S>>) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let id = self.handle.id;
        let mut deadline = Instant::now() + self.pong_wait;

        loop {
            let frame = tokio::select! {
                _ = self.handle.token.cancelled() => return CloseReason::Shutdown,
                frame = tokio::time::timeout_at(deadline, stream.next()) => frame,
            };

            let message = match frame {
                Err(_) => {
                    warn!(connection_id = id, "No pong within {:?}, dropping connection", self.pong_wait);
                    self.metrics.heartbeat_timeouts.inc();
                    return CloseReason::HeartbeatTimeout;
                }
                Ok(None) => return CloseReason::ClientClosed,
                Ok(Some(Err(e))) => {
                    debug!(connection_id = id, "WebSocket read error: {}", e);
                    return CloseReason::TransportError;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                WsMessage::Text(text) => self.handle_frame(text.as_bytes()).await,
                WsMessage::Binary(data) => self.handle_frame(&data).await,
                WsMessage::Pong(_) => {
                    deadline = Instant::now() + self.pong_wait;
                }
                WsMessage::Close(_) => {
                    debug!(connection_id = id, "Received close frame");
                    return CloseReason::ClientClosed;
                }
                // Pings are answered by tungstenite itself
                WsMessage::Ping(_) | WsMessage::Frame(_) => {}
            }
        }
    }

    /// Decode and apply one inbound data frame
    async fn handle_frame(&self, bytes: &[u8]) {
        let id = self.handle.id;
        self.metrics.messages_received.inc();

        let event = match Event::decode(bytes) {
            Ok(event) => event,
            Err(e) => {
                warn!(connection_id = id, "Rejected inbound message: {}", e);
                self.reject(&e);
                return;
            }
        };

        let kind = event.kind();
        let hub = &self.hub;
        match self.processor.apply_and_publish(event, |answer| {
            hub.broadcast(answer);
        })
        .await
        {
            Ok(_) => debug!(connection_id = id, kind, "Event applied"),
            Err(e) => {
                warn!(connection_id = id, kind, "Event rejected: {}", e);
                self.reject(&e);
            }
        }
    }

    fn reject(&self, err: &ledger::LedgerError) {
        self.metrics.messages_rejected.inc();
        self.hub.send_to(self.handle.id, &Answer::error(err));
    }
}

/// Hub membership of a running connection
///
/// Dropping it cancels both loops and removes the connection from the hub, on
/// every exit path of [`Connection::run`] including a panic in the receive loop.
struct Registration {
    handle: ConnectionHandle,
    hub: Arc<Hub>,
    metrics: Arc<GatewayMetrics>,
}

impl Registration {
    fn new(handle: ConnectionHandle, hub: Arc<Hub>, metrics: Arc<GatewayMetrics>) -> Self {
        Self { handle, hub, metrics }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.handle.close();
        self.hub.deregister(self.handle.id);
        self.metrics.connections_closed.inc();
    }
}

/// Single writer for the socket
async fn send_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, WsMessage>,
    queue: Arc<OutboundQueue>,
    token: CancellationToken,
    ping_period: Duration,
    id: ConnectionId,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_period, ping_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let result = tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => sink.send(WsMessage::Ping(Vec::new())).await,
            message = queue.recv() => sink.send(message).await,
        };

        if let Err(e) = result {
            debug!(connection_id = id, "WebSocket write error: {}", e);
            break;
        }
    }

    // The receive loop may still be waiting on the socket
    token.cancel();

    if let Err(e) = sink.send(WsMessage::Close(None)).await {
        debug!(connection_id = id, "Close frame not sent: {}", e);
    }
    if let Err(e) = sink.close().await {
        debug!(connection_id = id, "Sink close failed: {}", e);
    }
}
