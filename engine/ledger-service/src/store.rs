//! Adapter exposing a persistence backend as the ledger's store

use std::sync::Arc;

use ledger::{Ledger, LedgerError, LedgerResult, LedgerStore};
use persistence::PersistenceBackend;

/// Stores ledgers as JSON snapshots in a [`PersistenceBackend`]
pub struct PersistenceStore {
    backend: Arc<dyn PersistenceBackend>,
}

impl PersistenceStore {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PersistenceStore {
    async fn save(&self, ledger: &Ledger, label: &str) -> LedgerResult<()> {
        let state = serde_json::to_value(ledger)?;
        self.backend
            .save_snapshot(label, state)
            .await
            .map(|_| ())
            .map_err(|e| LedgerError::Store(e.to_string()))
    }

    async fn load(&self, label: &str) -> LedgerResult<Option<Ledger>> {
        let snapshot = self
            .backend
            .load_snapshot(label)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;

        match snapshot {
            Some(snapshot) => Ok(Some(serde_json::from_value(snapshot.state)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::InMemoryPersistence;

    #[tokio::test]
    async fn test_round_trip_through_backend() {
        let backend = Arc::new(InMemoryPersistence::with_default_config());
        backend.initialize().await.unwrap();
        let store = PersistenceStore::new(backend.clone());

        let mut ledger = Ledger::new();
        ledger.add_user("A");
        ledger.set_price(0.5);
        store.save(&ledger, "history").await.unwrap();

        assert_eq!(store.load("history").await.unwrap(), Some(ledger));
        assert_eq!(store.load("other").await.unwrap(), None);

        let raw = backend.load_snapshot("history").await.unwrap().unwrap();
        assert_eq!(raw.state["users"][0]["name"], "A");
        assert_eq!(raw.state["nextUserId"], 1);
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_store_error() {
        // never initialized, so every call is rejected
        let backend = Arc::new(InMemoryPersistence::with_default_config());
        let store = PersistenceStore::new(backend);

        let result = store.save(&Ledger::new(), "history").await;
        assert!(matches!(result, Err(LedgerError::Store(_))));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_a_serialization_error() {
        let backend = Arc::new(InMemoryPersistence::with_default_config());
        backend.initialize().await.unwrap();
        backend.save_snapshot("history", serde_json::json!({"users": "nope"})).await.unwrap();
        let store = PersistenceStore::new(backend);

        assert!(matches!(store.load("history").await, Err(LedgerError::Serialization(_))));
    }
}
