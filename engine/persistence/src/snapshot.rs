//! Stored state records
//!
//! A snapshot wraps one key's state document with the time it was written, so an
//! operator inspecting a state file can tell how fresh it is.

use crate::backend::PersistenceBackend;
use crate::error::{PersistenceError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current on-disk record format
pub const SNAPSHOT_VERSION: u32 = 1;

/// A saved state document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Storage key
    pub key: String,

    /// When the record was written
    pub saved_at: DateTime<Utc>,

    /// Record format version
    pub version: u32,

    /// The state itself
    pub state: serde_json::Value,
}

impl Snapshot {
    pub fn new(key: impl Into<String>, state: serde_json::Value) -> Self {
        Self { key: key.into(), saved_at: Utc::now(), version: SNAPSHOT_VERSION, state }
    }
}

/// Storage key for a market's state. Characters outside `[A-Za-z0-9_-]` become `_`.
pub fn market_key(market: &str) -> String {
    let sanitized: String = market
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!("ladder_{sanitized}")
}

/// Keys reach the filesystem, so only a conservative alphabet is accepted
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PersistenceError::invalid_key("empty key"));
    }
    if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(PersistenceError::invalid_key(key));
    }
    Ok(())
}

/// Load and decode the state stored under `key`
pub async fn load_typed<T, B>(backend: &B, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned,
    B: PersistenceBackend + ?Sized,
{
    match backend.load(key).await? {
        Some(snapshot) => Ok(Some(serde_json::from_value(snapshot.state)?)),
        None => Ok(None),
    }
}

/// Encode `state` and store it under `key`
pub async fn save_typed<T, B>(backend: &B, key: &str, state: &T) -> Result<()>
where
    T: Serialize + ?Sized,
    B: PersistenceBackend + ?Sized,
{
    let snapshot = Snapshot::new(key, serde_json::to_value(state)?);
    backend.save(snapshot).await
}
