// In-memory key-value store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{expires_at, KeyValueStore};
use crate::error::EngineError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Process-local store; contents are lost on restart
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(Utc::now()))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expires_at(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, EngineError> {
        let mut entries = self.entries.write().await;
        Ok(entries
            .remove(key)
            .map_or(false, |e| !e.is_expired(Utc::now())))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, EngineError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(Utc::now()) => {
                entry.expires_at = expires_at(Some(ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<Vec<String>, EngineError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let mut expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        expired.sort();
        Ok(expired)
    }
}
