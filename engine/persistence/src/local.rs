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
    use crate::snapshot::{load_typed, market_key, save_typed, Snapshot};
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rung {
        id: String,
        rate: f64,
        filled: bool,
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
        let data_dir = temp_dir.path().join("nested").join("state");

        let mut persistence = create_local_persistence(data_dir).unwrap();
        tokio_test::assert_ok!(persistence.initialize().await);

        // Verify directories were created
        assert!(persistence.data_dir().exists());
    }

    #[tokio::test]
    async fn test_requires_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let persistence = create_local_persistence(temp_dir.path()).unwrap();

        let result = persistence.load("ladder_LTCBTC").await;
        assert!(matches!(result, Err(PersistenceError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        let loaded: Option<Vec<Rung>> = load_typed(&persistence, &market_key("LTCBTC")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        let rungs = vec![
            Rung { id: "a".to_string(), rate: 101.0, filled: false },
            Rung { id: String::new(), rate: 100.0, filled: true },
        ];
        let key = market_key("LTCBTC");
        save_typed(&persistence, &key, &rungs).await.unwrap();

        assert!(temp_dir.path().join("ladder_LTCBTC.json").exists());
        assert!(!temp_dir.path().join("ladder_LTCBTC.json.tmp").exists());

        let loaded: Vec<Rung> = load_typed(&persistence, &key).await.unwrap().unwrap();
        assert_eq!(loaded, rungs);
    }

    #[tokio::test]
    async fn test_file_round_trip_keeps_exact_floats() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        // Rates and sizes of a fine grid are rarely short decimals
        let step = 0.01 * 0.005;
        let rungs: Vec<(f64, f64)> = (0..=20)
            .map(|k| {
                let rate = 0.0105 - (k as f64) * step;
                (rate, 0.01 / rate)
            })
            .collect();
        save_typed(&persistence, "ladder_FINE", &rungs).await.unwrap();

        let loaded: Vec<(f64, f64)> = load_typed(&persistence, "ladder_FINE").await.unwrap().unwrap();
        assert_eq!(loaded.len(), rungs.len());
        for ((rate, qty), (saved_rate, saved_qty)) in loaded.iter().zip(&rungs) {
            assert_eq!(rate.to_bits(), saved_rate.to_bits());
            assert_eq!(qty.to_bits(), saved_qty.to_bits());
        }
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_state() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        save_typed(&persistence, "ladder_A", &1u32).await.unwrap();
        save_typed(&persistence, "ladder_A", &2u32).await.unwrap();

        let loaded: Option<u32> = load_typed(&persistence, "ladder_A").await.unwrap();
        assert_eq!(loaded, Some(2));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        std::fs::write(temp_dir.path().join("ladder_BAD.json"), b"{ not json").unwrap();

        let result = persistence.load("ladder_BAD").await;
        assert!(matches!(result, Err(PersistenceError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_snapshot_metadata_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let mut persistence = create_local_persistence(temp_dir.path()).unwrap();
        persistence.initialize().await.unwrap();

        let snapshot = Snapshot::new("ladder_META", serde_json::json!({"first_run": true}));
        persistence.save(snapshot.clone()).await.unwrap();

        let loaded = persistence.load("ladder_META").await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }
}
