// Bounded per-connection queue of outbound WebSocket frames

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Outbound queue between the hub (many producers) and a connection's send loop
///
/// - Producers never block; a full queue is resolved by the backpressure policy
/// - Exactly one consumer, the connection's send loop
/// - Fixed capacity so a slow client cannot grow server memory without bound
#[derive(Debug)]
pub struct OutboundQueue {
    messages: Mutex<VecDeque<WsMessage>>,
    notify: Notify,
    capacity: usize,
    backpressure_policy: BackpressurePolicy,
}

/// Backpressure handling policy for queue overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Disconnect the slow client
    #[default]
    Disconnect,
    /// Evict the oldest queued message to make room
    DropOldest,
}

/// Result of pushing onto an [`OutboundQueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest message
    DroppedOldest,
    /// Queue full under [`BackpressurePolicy::Disconnect`]; nothing was queued
    Overflow,
}

impl OutboundQueue {
    pub fn new(capacity: usize, backpressure_policy: BackpressurePolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            backpressure_policy,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Enqueue a message without waiting
    pub fn push(&self, message: WsMessage) -> PushOutcome {
        let outcome = {
            let mut messages = self.messages.lock();
            if messages.len() < self.capacity {
                messages.push_back(message);
                PushOutcome::Queued
            } else {
                match self.backpressure_policy {
                    BackpressurePolicy::Disconnect => return PushOutcome::Overflow,
                    BackpressurePolicy::DropOldest => {
                        messages.pop_front();
                        messages.push_back(message);
                        PushOutcome::DroppedOldest
                    }
                }
            }
        };

        self.notify.notify_one();
        outcome
    }

    /// Dequeue the oldest message, if any
    pub fn try_pop(&self) -> Option<WsMessage> {
        self.messages.lock().pop_front()
    }

    /// Wait for the next message
    ///
    /// Cancel safe: a message is only removed from the queue in the same poll
    /// that returns it.
    pub async fn recv(&self) -> WsMessage {
        loop {
            if let Some(message) = self.try_pop() {
                return message;
            }
            self.notify.notified().await;
        }
    }
}
