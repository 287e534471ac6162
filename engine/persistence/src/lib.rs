//! # Persistence Layer
//!
//! Durable, keyed state storage for the ladder engine. Each ladder saves its
//! full state under a key derived from its market after every tick, and loads
//! it back at startup. A missing key is a normal "fresh start", not an error.
//!
//! ## Architecture
//!
//! - **PersistenceBackend**: object-safe trait over JSON documents
//! - **LocalPersistence**: one JSON file per key, written atomically
//! - **InMemoryPersistence**: process-local map, for tests
//! - **load_typed / save_typed**: serde conversion on top of any backend
//!
//! ## Usage
//!
//! ```rust
//! use persistence::{create_local_persistence, load_typed, save_typed, PersistenceBackend};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let mut store = create_local_persistence(temp_dir.path())?;
//!     store.initialize().await?;
//!
//!     save_typed(&store, "ladder_LTCBTC", &vec![1.0, 2.0]).await?;
//!     let loaded: Option<Vec<f64>> = load_typed(&store, "ladder_LTCBTC").await?;
//!     assert_eq!(loaded, Some(vec![1.0, 2.0]));
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod snapshot;

pub use backend::{InMemoryPersistence, LocalPersistence, PersistenceBackend};
pub use config::PersistenceConfig;
pub use error::{PersistenceError, Result};
pub use local::{create_local_persistence, create_local_persistence_with_config};
pub use snapshot::{load_typed, market_key, save_typed, Snapshot};
