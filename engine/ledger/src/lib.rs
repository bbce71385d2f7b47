//! Ledger - shared state model and event processor
//!
//! This crate owns the shared ledger (users, price, activity history) and the
//! transition function that applies inbound client events to it. It has no
//! transport or storage code of its own; both are reached through the
//! [`LedgerStore`] and [`Clock`] ports, which the service wires to concrete
//! implementations.
//!
//! ## Architecture
//!
//! - **Ledger**: users, shared price, history, and the coalescing algorithm
//! - **EventProcessor**: serializes every mutation behind one lock, persists
//!   after each successful transition and hands the answer to a publisher
//! - **Messages**: inbound `Event` and outbound `Answer` envelopes

pub mod clock;
pub mod config;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod processor;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use messages::{Answer, Event};
pub use processor::EventProcessor;
pub use store::{LedgerStore, MemoryStore};
pub use types::{HistoryEntry, User, UserId};

/// Label used for routine saves after every mutation
pub const DEFAULT_STORE_LABEL: &str = "history";

/// Default coalescing window in seconds
pub const DEFAULT_COALESCING_WINDOW_SECS: u64 = 120;
