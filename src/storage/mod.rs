// Storage layer: pluggable key-value stores and the session store built on them

pub mod file;
pub mod memory;
pub mod session_store;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::EngineError;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use session_store::{AnswerApplied, SessionStore};

/// Minimal key-value interface the engine persists through.
///
/// Values are opaque strings (JSON in practice). Expired keys behave as
/// absent; `purge_expired` reclaims their space.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError>;

    /// Store a value, replacing any previous one. `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), EngineError>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, EngineError>;

    /// Reset a key's time to live. Returns whether the key existed.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, EngineError>;

    /// Drop every expired key, returning the keys removed
    async fn purge_expired(&self) -> Result<Vec<String>, EngineError>;
}

/// Read and deserialize a JSON value
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, EngineError> {
    match store.get(key).await? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| EngineError::Storage(format!("Failed to parse '{}': {}", key, e))),
        None => Ok(None),
    }
}

/// Serialize and store a JSON value
pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), EngineError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| EngineError::Storage(format!("Failed to serialize '{}': {}", key, e)))?;
    store.set(key, raw, ttl).await
}

fn expires_at(ttl: Option<Duration>) -> Option<chrono::DateTime<chrono::Utc>> {
    ttl.and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| chrono::Utc::now() + d)
}
