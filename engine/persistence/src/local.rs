//! Local file-based persistence implementation

use crate::backend::LocalPersistence;
use crate::config::PersistenceConfig;
use crate::error::Result;

/// Create a new local persistence instance with default configuration
pub fn create_local_persistence(
    data_dir: impl Into<std::path::PathBuf>,
) -> Result<LocalPersistence> {
    LocalPersistence::with_default_config(data_dir)
}

/// Create a new local persistence instance with custom configuration
pub fn create_local_persistence_with_config(config: PersistenceConfig) -> Result<LocalPersistence> {
    LocalPersistence::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PersistenceBackend;
    use crate::error::PersistenceError;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_ledger(price: f64) -> serde_json::Value {
        json!({
            "users": [{"id": 0, "name": "A", "debt": 4}],
            "price": price,
            "history": [],
            "nextUserId": 1
        })
    }

    #[tokio::test]
    async fn test_local_persistence_creation() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().to_path_buf();

        let persistence = create_local_persistence(data_dir).unwrap();
        assert_eq!(persistence.data_dir(), &temp_dir.path().to_path_buf());
    }

    #[tokio::test]
    async fn test_local_persistence_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested").join("data");

        let persistence = create_local_persistence(data_dir).unwrap();
        persistence.initialize().await.unwrap();

        assert!(persistence.data_dir().exists());
        assert!(persistence.data_dir().join("snapshots").exists());
    }

    #[tokio::test]
    async fn test_operations_before_initialize_fail() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = create_local_persistence(temp_dir.path()).unwrap();

        let result = persistence.save_snapshot("history", sample_ledger(1.0)).await;
        assert!(matches!(result, Err(PersistenceError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_save_and_reload_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let persistence = create_local_persistence(temp_dir.path()).unwrap();
            persistence.initialize().await.unwrap();
            persistence.save_snapshot("history", sample_ledger(2.5)).await.unwrap();
            persistence.shutdown().await.unwrap();
        }

        let persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        let snapshot = persistence.load_snapshot("history").await.unwrap().unwrap();
        assert_eq!(snapshot.state, sample_ledger(2.5));
    }

    #[tokio::test]
    async fn test_archive_label_with_punctuation() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        let info = persistence.save_snapshot("2 Jan, 2006 15:04", sample_ledger(1.0)).await.unwrap();
        assert_eq!(
            info.path.unwrap(),
            temp_dir.path().join("snapshots").join("2_Jan__2006_15_04.json")
        );

        let snapshot = persistence.load_snapshot("2 Jan, 2006 15:04").await.unwrap().unwrap();
        assert_eq!(snapshot.label, "2 Jan, 2006 15:04");
    }

    #[tokio::test]
    async fn test_stale_temp_files_removed_on_initialize() {
        let temp_dir = TempDir::new().unwrap();
        let snapshots_dir = temp_dir.path().join("snapshots");
        std::fs::create_dir_all(&snapshots_dir).unwrap();
        std::fs::write(snapshots_dir.join("history.json.tmp"), b"{").unwrap();

        let persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        assert!(!snapshots_dir.join("history.json.tmp").exists());
        assert!(persistence.list_snapshots().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_retention_prunes_on_save() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = PersistenceConfig::new(temp_dir.path());
        config.snapshot.max_archives = 1;
        config.snapshot.pretty = false;

        let persistence = create_local_persistence_with_config(config).unwrap();
        persistence.initialize().await.unwrap();

        persistence.save_snapshot("history", sample_ledger(1.0)).await.unwrap();
        persistence.save_snapshot("archive a", sample_ledger(1.0)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        persistence.save_snapshot("archive b", sample_ledger(1.0)).await.unwrap();

        let labels: Vec<String> =
            persistence.list_snapshots().await.unwrap().into_iter().map(|s| s.label).collect();
        assert_eq!(labels.len(), 2);
        assert!(labels.contains(&"history".to_string()));
        assert!(labels.contains(&"archive b".to_string()));
    }
}
