//! Persistence backend trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::snapshot::{Snapshot, SnapshotInfo, SnapshotManager};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Abstract trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Initialize the persistence backend
    async fn initialize(&self) -> Result<()>;

    /// Shutdown the persistence backend
    async fn shutdown(&self) -> Result<()>;

    /// Save `state` under `label`, replacing whatever was stored there
    async fn save_snapshot(&self, label: &str, state: serde_json::Value) -> Result<SnapshotInfo>;

    /// Load the snapshot stored under `label`
    async fn load_snapshot(&self, label: &str) -> Result<Option<Snapshot>>;

    /// List stored snapshots, oldest first
    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>>;

    /// Get the configuration
    fn config(&self) -> &PersistenceConfig;

    /// Get the data directory
    fn data_dir(&self) -> &PathBuf;
}

fn ensure_initialized(initialized: &AtomicBool) -> Result<()> {
    if initialized.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(PersistenceError::invalid_operation("Persistence backend not initialized"))
    }
}

/// Local file-based persistence backend
pub struct LocalPersistence {
    config: PersistenceConfig,
    snapshot_manager: SnapshotManager,
    initialized: AtomicBool,
}

impl LocalPersistence {
    /// Create a new local persistence backend
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(PersistenceError::config)?;

        let snapshot_manager =
            SnapshotManager::new(config.snapshot.clone(), config.snapshots_dir())?;

        Ok(Self { config, snapshot_manager, initialized: AtomicBool::new(false) })
    }

    /// Create a new local persistence backend with default config
    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(PersistenceConfig::new(data_dir))
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for LocalPersistence {
    async fn initialize(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.config.data_dir).await?;
        tokio::fs::create_dir_all(self.config.snapshots_dir()).await?;

        // Leftovers from a crash between write and rename
        let mut entries = tokio::fs::read_dir(self.config.snapshots_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.to_string_lossy().ends_with(".json.tmp") {
                tracing::warn!("Removing incomplete snapshot {:?}", path);
                tokio::fs::remove_file(&path).await?;
            }
        }

        self.initialized.store(true, Ordering::Release);

        tracing::info!("Local persistence backend initialized at: {:?}", self.config.data_dir);

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::info!("Local persistence backend shutdown complete");

        Ok(())
    }

    async fn save_snapshot(&self, label: &str, state: serde_json::Value) -> Result<SnapshotInfo> {
        ensure_initialized(&self.initialized)?;
        self.snapshot_manager.save(label, state).await
    }

    async fn load_snapshot(&self, label: &str) -> Result<Option<Snapshot>> {
        ensure_initialized(&self.initialized)?;
        self.snapshot_manager.load(label).await
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        ensure_initialized(&self.initialized)?;
        self.snapshot_manager.list_snapshots().await
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }
}

/// In-memory persistence backend (for testing)
pub struct InMemoryPersistence {
    config: PersistenceConfig,
    snapshots: Mutex<HashMap<String, Snapshot>>,
    initialized: AtomicBool,
}

impl InMemoryPersistence {
    /// Create a new in-memory persistence backend
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config, snapshots: Mutex::new(HashMap::new()), initialized: AtomicBool::new(false) }
    }

    /// Create a new in-memory persistence backend with default config
    pub fn with_default_config() -> Self {
        Self::new(PersistenceConfig::default())
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn initialize(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::info!("In-memory persistence backend initialized");

        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        tracing::info!("In-memory persistence backend shutdown complete");

        Ok(())
    }

    async fn save_snapshot(&self, label: &str, state: serde_json::Value) -> Result<SnapshotInfo> {
        ensure_initialized(&self.initialized)?;

        let snapshot = Snapshot::new(label, state);
        let size = serde_json::to_vec(&snapshot.state)?.len() as u64;
        let info = SnapshotInfo {
            label: snapshot.label.clone(),
            path: None,
            size,
            saved_at: snapshot.saved_at,
        };

        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(label.to_string(), snapshot);

        // Pinned labels never count against retention
        let mut archives: Vec<(String, chrono::DateTime<chrono::Utc>)> = snapshots
            .values()
            .filter(|s| !self.config.snapshot.is_pinned(&s.label))
            .map(|s| (s.label.clone(), s.saved_at))
            .collect();
        if archives.len() > self.config.snapshot.max_archives {
            archives.sort_by_key(|(_, saved_at)| *saved_at);
            let excess = archives.len() - self.config.snapshot.max_archives;
            for (label, _) in archives.into_iter().take(excess) {
                snapshots.remove(&label);
            }
        }

        Ok(info)
    }

    async fn load_snapshot(&self, label: &str) -> Result<Option<Snapshot>> {
        ensure_initialized(&self.initialized)?;

        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.get(label).cloned())
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        ensure_initialized(&self.initialized)?;

        let snapshots = self.snapshots.lock().await;
        let mut infos = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots.values() {
            infos.push(SnapshotInfo {
                label: snapshot.label.clone(),
                path: None,
                size: serde_json::to_vec(&snapshot.state)?.len() as u64,
                saved_at: snapshot.saved_at,
            });
        }
        infos.sort_by_key(|s| s.saved_at);

        Ok(infos)
    }

    fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }
}
