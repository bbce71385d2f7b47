//! # Persistence Layer
//!
//! This crate provides snapshot storage for the shared ledger. Every save
//! replaces the whole document stored under a label: the routine label is
//! rewritten after each mutation, while timestamp-labeled archives accumulate
//! and are pruned once they exceed the configured retention.
//!
//! ## Architecture
//!
//! - **PersistenceBackend**: Abstract trait for different storage backends
//! - **LocalPersistence**: One JSON file per label in a data directory
//! - **InMemoryPersistence**: Process-local map, for tests and ephemeral runs
//! - **SnapshotManager**: Atomic file writes, listing and archive retention
//!
//! ## Usage
//!
//! ```rust
//! use persistence::{PersistenceBackend, create_local_persistence};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let persistence = create_local_persistence(temp_dir.path())?;
//!     persistence.initialize().await?;
//!
//!     persistence.save_snapshot("history", serde_json::json!({"price": 1.5})).await?;
//!     let snapshot = persistence.load_snapshot("history").await?;
//!     assert!(snapshot.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod snapshot;

pub use backend::{InMemoryPersistence, LocalPersistence, PersistenceBackend};
pub use config::{PersistenceConfig, SnapshotConfig};
pub use error::{PersistenceError, Result};
pub use local::{create_local_persistence, create_local_persistence_with_config};
pub use snapshot::{Snapshot, SnapshotInfo};

pub use chrono::{DateTime, Utc};
