//! Service state management and component initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::store::PersistenceStore;
use ledger::{EventProcessor, SystemClock};
use ledger_gateway::LedgerGateway;
use persistence::{LocalPersistence, PersistenceBackend};

/// Service state containing all initialized components
pub struct ServiceState {
    /// Service configuration
    pub config: ServiceConfig,

    /// Persistence backend instance
    pub persistence: Arc<dyn PersistenceBackend>,

    /// Owner of the shared ledger
    pub processor: Arc<EventProcessor>,

    /// LedgerGateway instance
    pub gateway: Arc<LedgerGateway>,
}

impl ServiceState {
    /// Create a new service state backed by snapshot files in the data directory
    pub async fn new(mut config: ServiceConfig) -> Result<Self> {
        info!("Initializing Persistence backend...");

        // The routine label is rewritten on every mutation; never prune it
        let default_label = config.ledger.default_label.clone();
        if !config.persistence.snapshot.is_pinned(&default_label) {
            config.persistence.snapshot.pinned_labels.push(default_label);
        }

        let backend = LocalPersistence::new(config.persistence.clone())
            .context("Failed to create Persistence backend")?;

        Self::with_persistence(config, Arc::new(backend)).await
    }

    /// Create a service state on top of an existing persistence backend
    pub async fn with_persistence(
        config: ServiceConfig,
        persistence: Arc<dyn PersistenceBackend>,
    ) -> Result<Self> {
        persistence.initialize().await.context("Failed to initialize Persistence backend")?;

        info!("Restoring ledger...");
        let store = Arc::new(PersistenceStore::new(persistence.clone()));
        let processor = EventProcessor::restore(store, Arc::new(SystemClock), config.ledger.clone())
            .await
            .context("Failed to restore ledger")?;
        let processor = Arc::new(processor);

        info!("Initializing LedgerGateway...");
        let gateway = Arc::new(LedgerGateway::new(config.gateway.clone(), processor.clone()));

        info!("Service components initialized successfully");
        Ok(Self { config, persistence, processor, gateway })
    }

    /// Run the LedgerGateway until it is stopped
    pub async fn start_gateway(&self) -> Result<()> {
        info!("Starting LedgerGateway...");
        self.gateway.start().await.context("LedgerGateway failed")
    }

    /// Stop accepting connections and close every open one
    pub fn stop_gateway(&self) {
        self.gateway.stop();
    }

    /// Final flush and persistence shutdown
    pub async fn shutdown(&self) -> Result<()> {
        info!("Flushing ledger...");
        if let Err(e) = self.processor.flush().await {
            error!("Final ledger flush failed: {}", e);
        }

        self.gateway.metrics().log_summary();

        info!("Shutting down persistence backend...");
        self.persistence.shutdown().await.context("Failed to shut down persistence")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger::{Answer, Event};
    use persistence::InMemoryPersistence;
    use tempfile::TempDir;

    fn create_test_config(data_dir: &std::path::Path) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.persistence.data_dir = data_dir.to_path_buf();
        config.gateway.host = "127.0.0.1".to_string();
        config.gateway.port = 0;
        config
    }

    #[tokio::test]
    async fn test_fresh_state_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let state = ServiceState::new(create_test_config(temp_dir.path())).await.unwrap();

        let ledger = state.processor.snapshot().await;
        assert!(ledger.users().is_empty());
        assert_eq!(ledger.price(), 0.0);
    }

    #[tokio::test]
    async fn test_ledger_survives_restart() {
        let temp_dir = TempDir::new().unwrap();

        {
            let state = ServiceState::new(create_test_config(temp_dir.path())).await.unwrap();
            state.processor.apply(Event::NewUser { name: "A".to_string() }).await.unwrap();
            state.processor.apply(Event::UpdateDebt { id: 0, debt: 4 }).await.unwrap();
            state.processor.apply(Event::UpdatePrice { price: 1.5 }).await.unwrap();
            state.shutdown().await.unwrap();
        }

        let state = ServiceState::new(create_test_config(temp_dir.path())).await.unwrap();
        let ledger = state.processor.snapshot().await;

        assert_eq!(ledger.users().len(), 1);
        assert_eq!(ledger.user(0).unwrap().debt, 4);
        assert_eq!(ledger.price(), 1.5);
        assert_eq!(ledger.history().len(), 1);

        // ids continue after the restored users
        let answer = state.processor.apply(Event::NewUser { name: "B".to_string() }).await.unwrap();
        assert!(matches!(answer, Answer::NewUser { user } if user.id == 1));
    }

    #[tokio::test]
    async fn test_reset_archive_written_to_disk() {
        let temp_dir = TempDir::new().unwrap();
        let state = ServiceState::new(create_test_config(temp_dir.path())).await.unwrap();

        state.processor.apply(Event::NewUser { name: "A".to_string() }).await.unwrap();
        state.processor.apply(Event::Reset { keep_participants: false }).await.unwrap();

        let labels: Vec<String> =
            state.persistence.list_snapshots().await.unwrap().into_iter().map(|s| s.label).collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"history".to_string()));
    }

    #[tokio::test]
    async fn test_custom_default_label_is_pinned() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = create_test_config(temp_dir.path());
        config.ledger.default_label = "current".to_string();

        let state = ServiceState::new(config).await.unwrap();

        assert!(state.persistence.config().snapshot.is_pinned("current"));
    }

    #[tokio::test]
    async fn test_shutdown_flushes_into_backend() {
        let backend = Arc::new(InMemoryPersistence::with_default_config());
        let state = ServiceState::with_persistence(ServiceConfig::default(), backend.clone())
            .await
            .unwrap();

        state.shutdown().await.unwrap();

        // shut down, so reinitialize to inspect
        backend.initialize().await.unwrap();
        assert!(backend.load_snapshot("history").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_gateway_stops_on_request() {
        let temp_dir = TempDir::new().unwrap();
        let state = Arc::new(ServiceState::new(create_test_config(temp_dir.path())).await.unwrap());

        let handle = {
            let state = state.clone();
            tokio::spawn(async move { state.start_gateway().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        state.stop_gateway();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
        assert!(result.unwrap().unwrap().is_ok());
    }
}
