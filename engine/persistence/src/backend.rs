//! Persistence backend trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::snapshot::{validate_key, Snapshot};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Abstract trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Initialize the persistence backend
    async fn initialize(&mut self) -> Result<()>;

    /// Load the snapshot stored under `key`, `None` if nothing was ever saved
    async fn load(&self, key: &str) -> Result<Option<Snapshot>>;

    /// Store a snapshot, replacing any previous one under the same key
    async fn save(&self, snapshot: Snapshot) -> Result<()>;

    /// Get the data directory
    fn data_dir(&self) -> &PathBuf;
}

/// Local file-based persistence backend
pub struct LocalPersistence {
    config: PersistenceConfig,
    initialized: bool,
}

impl LocalPersistence {
    /// Create a new local persistence backend
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        // Validate configuration
        config.validate().map_err(PersistenceError::config)?;

        Ok(Self { config, initialized: false })
    }

    /// Create a new local persistence backend with default config
    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let config = PersistenceConfig::new(data_dir);
        Self::new(config)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(PersistenceError::invalid_operation("Persistence backend not initialized"));
        }
        Ok(())
    }

    fn write_snapshot_file(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let file_path = self.config.state_file(&snapshot.key);
        let tmp_path = file_path.with_extension("json.tmp");

        let file = OpenOptions::new().create(true).write(true).truncate(true).open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        if self.config.pretty {
            serde_json::to_writer_pretty(&mut writer, snapshot)?;
        } else {
            serde_json::to_writer(&mut writer, snapshot)?;
        }

        writer.flush()?;
        if self.config.fsync_every_write {
            writer.get_ref().sync_all()?;
        }
        drop(writer);

        // Rename is atomic on the same filesystem, a crash never leaves a torn file
        std::fs::rename(&tmp_path, &file_path)?;

        Ok(file_path)
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for LocalPersistence {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        // Ensure data directory exists
        std::fs::create_dir_all(&self.config.data_dir)?;

        self.initialized = true;

        tracing::info!("Local persistence backend initialized at: {:?}", self.config.data_dir);

        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Snapshot>> {
        self.ensure_initialized()?;
        validate_key(key)?;

        let path = self.config.state_file(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No saved state for {}", key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;

        tracing::debug!("Loaded state {} saved at {}", key, snapshot.saved_at);

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        self.ensure_initialized()?;
        validate_key(&snapshot.key)?;

        let path = self.write_snapshot_file(&snapshot)?;

        tracing::debug!("Saved state {} to {:?}", snapshot.key, path);

        Ok(())
    }

    fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }
}

/// In-memory persistence backend (for testing)
pub struct InMemoryPersistence {
    config: PersistenceConfig,
    snapshots: Arc<Mutex<HashMap<String, Snapshot>>>,
    saves: Arc<std::sync::atomic::AtomicU64>,
    fail_saves: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryPersistence {
    /// Create a new in-memory persistence backend
    pub fn new(config: PersistenceConfig) -> Self {
        Self {
            config,
            snapshots: Arc::new(Mutex::new(HashMap::new())),
            saves: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            fail_saves: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Create a new in-memory persistence backend with default config
    pub fn with_default_config() -> Self {
        Self::new(PersistenceConfig::default())
    }

    /// Number of successful saves since creation
    pub fn save_count(&self) -> u64 {
        self.saves.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Make every subsequent save fail with an I/O error until switched off
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, std::sync::atomic::Ordering::Relaxed);
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn initialize(&mut self) -> Result<()> {
        tracing::info!("In-memory persistence backend initialized");
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Snapshot>> {
        validate_key(key)?;
        Ok(self.snapshots.lock().await.get(key).cloned())
    }

    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        validate_key(&snapshot.key)?;
        if self.fail_saves.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(std::io::Error::new(ErrorKind::Other, "simulated write failure").into());
        }
        self.snapshots.lock().await.insert(snapshot.key.clone(), snapshot);
        self.saves.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }

    fn data_dir(&self) -> &PathBuf {
        &self.config.data_dir
    }
}
