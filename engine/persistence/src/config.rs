//! Configuration for the persistence layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Base directory for persistence files
    pub data_dir: PathBuf,

    /// Snapshot configuration
    pub snapshot: SnapshotConfig,
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Maximum number of archive snapshots to keep (pinned labels excluded)
    pub max_archives: usize,

    /// Labels that are rewritten in place and never pruned
    pub pinned_labels: Vec<String>,

    /// Whether to pretty-print snapshot files
    pub pretty: bool,

    /// Whether to fsync every snapshot before it replaces the previous file
    pub fsync: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), snapshot: SnapshotConfig::default() }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_archives: 50,
            pinned_labels: vec!["history".to_string()],
            pretty: true,
            fsync: false, // Balance between performance and durability
        }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Get the snapshots directory path
    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }

        if self.snapshot.max_archives == 0 {
            return Err("Snapshot max_archives must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl SnapshotConfig {
    /// Whether `label` is exempt from archive pruning
    pub fn is_pinned(&self, label: &str) -> bool {
        self.pinned_labels.iter().any(|l| l == label)
    }
}
