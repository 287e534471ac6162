//! Configuration for the persistence layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base directory for state files
    pub data_dir: PathBuf,

    /// Pretty-print JSON so state files stay readable by operators
    pub pretty: bool,

    /// Whether to fsync each state file before the atomic rename
    pub fsync_every_write: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data"), pretty: true, fsync_every_write: false }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Path of the state file for `key`
    pub fn state_file(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }

        Ok(())
    }
}
