//! Snapshot files and archive retention
//!
//! A snapshot is one serialized document stored under a caller-chosen label.
//! Labels may be arbitrary human-readable text ("2 Jan, 2006 15:04"), so file
//! names are derived from a sanitized form and the original label is kept
//! inside the file.

use crate::config::SnapshotConfig;
use crate::error::{PersistenceError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Snapshot format version written into every file
pub const SNAPSHOT_VERSION: &str = "1.0";

const SNAPSHOT_EXTENSION: &str = "json";

/// A saved document and its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Label the snapshot was saved under
    pub label: String,

    /// Timestamp when the snapshot was written
    pub saved_at: DateTime<Utc>,

    /// Snapshot format version
    pub version: String,

    /// The saved document
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn new(label: impl Into<String>, state: serde_json::Value) -> Self {
        Self { label: label.into(), saved_at: Utc::now(), version: SNAPSHOT_VERSION.to_string(), state }
    }
}

/// Snapshot listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Label the snapshot was saved under
    pub label: String,

    /// File path, if stored on disk
    pub path: Option<PathBuf>,

    /// Size in bytes of the serialized snapshot
    pub size: u64,

    /// Timestamp when the snapshot was written
    pub saved_at: DateTime<Utc>,
}

/// Map a label to a portable file stem
pub fn file_stem_for(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

/// File-backed snapshot manager
pub struct SnapshotManager {
    config: SnapshotConfig,
    snapshots_dir: PathBuf,
}

impl SnapshotManager {
    /// Create a new snapshot manager
    pub fn new(config: SnapshotConfig, snapshots_dir: PathBuf) -> Result<Self> {
        // Ensure snapshots directory exists
        std::fs::create_dir_all(&snapshots_dir).map_err(PersistenceError::Io)?;

        Ok(Self { config, snapshots_dir })
    }

    /// Write `state` under `label`, replacing any previous snapshot with that label
    pub async fn save(&self, label: &str, state: serde_json::Value) -> Result<SnapshotInfo> {
        let snapshot = Snapshot::new(label, state);
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(&snapshot)?
        } else {
            serde_json::to_vec(&snapshot)?
        };

        let path = self.path_for(label);
        self.write_atomically(&path, &bytes).await?;

        tracing::debug!("Saved snapshot '{}' ({} bytes) to {:?}", label, bytes.len(), path);

        // The snapshot is already in place; retention is best effort
        if !self.config.is_pinned(label) {
            if let Err(e) = self.cleanup_old_snapshots().await {
                tracing::warn!("Failed to prune archives after saving '{}': {}", label, e);
            }
        }

        Ok(SnapshotInfo {
            label: snapshot.label,
            path: Some(path),
            size: bytes.len() as u64,
            saved_at: snapshot.saved_at,
        })
    }

    /// Load the snapshot saved under `label`
    pub async fn load(&self, label: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(label);
        if !path.exists() {
            return Ok(None);
        }

        let snapshot = Self::read_snapshot(&path).await?;
        if snapshot.label != label {
            // Two labels sanitized to the same file name; the newer one won
            return Err(PersistenceError::corruption(format!(
                "snapshot file {:?} holds label '{}', expected '{}'",
                path, snapshot.label, label
            )));
        }

        Ok(Some(snapshot))
    }

    /// Get information about all snapshots, oldest first
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        let mut snapshots = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.snapshots_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }

            let size = entry.metadata().await?.len();
            match Self::read_snapshot(&path).await {
                Ok(snapshot) => snapshots.push(SnapshotInfo {
                    label: snapshot.label,
                    path: Some(path),
                    size,
                    saved_at: snapshot.saved_at,
                }),
                Err(e) => tracing::warn!("Skipping unreadable snapshot {:?}: {}", path, e),
            }
        }

        snapshots.sort_by_key(|s| s.saved_at);
        Ok(snapshots)
    }

    /// Remove the oldest archives beyond `max_archives`; pinned labels are kept
    pub async fn cleanup_old_snapshots(&self) -> Result<usize> {
        let archives: Vec<SnapshotInfo> = self
            .list_snapshots()
            .await?
            .into_iter()
            .filter(|s| !self.config.is_pinned(&s.label))
            .collect();

        if archives.len() <= self.config.max_archives {
            return Ok(0);
        }

        let to_remove = archives.len() - self.config.max_archives;
        let mut removed = 0;
        for archive in archives.iter().take(to_remove) {
            let Some(path) = &archive.path else { continue };
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    removed += 1;
                    tracing::info!("Removed old archive '{}' at {:?}", archive.label, path);
                }
                Err(e) => tracing::warn!("Failed to remove old archive {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }

    /// Path of the file backing `label`
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.snapshots_dir.join(format!("{}.{}", file_stem_for(label), SNAPSHOT_EXTENSION))
    }

    // Private methods

    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        if self.config.fsync {
            file.sync_all().await?;
        }
        drop(file);

        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    async fn read_snapshot(path: &Path) -> Result<Snapshot> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
