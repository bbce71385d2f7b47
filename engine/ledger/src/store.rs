//! Persistence port for the ledger
//!
//! The processor only knows how to hand a ledger and a label to a
//! [`LedgerStore`]; where and how it is written is up to the implementation.

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Label-addressed storage for whole-ledger snapshots
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    /// Save the full ledger under `label`, replacing any previous save
    async fn save(&self, ledger: &Ledger, label: &str) -> LedgerResult<()>;

    /// Load the ledger last saved under `label`
    async fn load(&self, label: &str) -> LedgerResult<Option<Ledger>>;
}

/// In-memory store (for testing and ephemeral runs)
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, Ledger>>,
    saves: Mutex<Vec<String>>,
    fail_saves: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels in the order they were saved, including repeats
    pub fn saved_labels(&self) -> Vec<String> {
        self.saves.lock().clone()
    }

    /// Snapshot currently stored under `label`
    pub fn get(&self, label: &str) -> Option<Ledger> {
        self.snapshots.lock().get(label).cloned()
    }

    /// Make every subsequent save fail (simulates a broken disk)
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryStore {
    async fn save(&self, ledger: &Ledger, label: &str) -> LedgerResult<()> {
        if *self.fail_saves.lock() {
            return Err(LedgerError::Store(format!("save of '{label}' rejected")));
        }

        self.snapshots.lock().insert(label.to_string(), ledger.clone());
        self.saves.lock().push(label.to_string());
        Ok(())
    }

    async fn load(&self, label: &str) -> LedgerResult<Option<Ledger>> {
        Ok(self.get(label))
    }
}
