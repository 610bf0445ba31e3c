// File-backed key-value store
//
// One JSON file per key, written atomically (temp file + rename) so a crash
// never leaves a half-written session behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{expires_at, KeyValueStore};
use crate::error::EngineError;

/// On-disk wrapper carrying the key and its expiry
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    key: String,
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Ensure a directory exists
fn ensure_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| format!("Failed to create directory {:?}: {}", path, e))?;
    }
    Ok(())
}

/// Write content atomically: write to a temp file, then rename over the target
pub fn atomic_write(path: &Path, content: &str) -> Result<(), String> {
    let temp_path = path.with_extension("tmp");

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    fs::write(&temp_path, content)
        .map_err(|e| format!("Failed to write temp file {:?}: {}", temp_path, e))?;

    fs::rename(&temp_path, path)
        .map_err(|e| format!("Failed to rename {:?} to {:?}: {}", temp_path, path, e))?;

    Ok(())
}

fn read_envelope(path: &Path) -> Result<Option<Envelope>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).map_err(|e| format!("Failed to read file {:?}: {}", path, e))?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| format!("Failed to parse JSON from {:?}: {}", path, e))
}

fn write_envelope(path: &Path, envelope: &Envelope) -> Result<(), String> {
    let content = serde_json::to_string_pretty(envelope)
        .map_err(|e| format!("Failed to serialize {}: {}", envelope.key, e))?;
    atomic_write(path, &content)
}

/// Persistent store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        ensure_dir(&root).map_err(EngineError::Storage)?;
        log::info!("File store at {:?}", root);
        Ok(Self { root })
    }

    /// Map a key to a file name that is safe on every platform
    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", name))
    }

    /// Run blocking file IO off the async runtime
    async fn blocking<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> Result<T, String> + Send + 'static,
    {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || f(root))
            .await
            .map_err(|e| EngineError::Storage(format!("Storage task failed: {}", e)))?
            .map_err(EngineError::Storage)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, EngineError> {
        let path = self.path_for(key);
        self.blocking(move |_| {
            Ok(read_envelope(&path)?
                .filter(|e| !e.is_expired(Utc::now()))
                .map(|e| e.value))
        })
        .await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), EngineError> {
        let path = self.path_for(key);
        let envelope = Envelope {
            key: key.to_string(),
            value,
            expires_at: expires_at(ttl),
        };
        self.blocking(move |_| write_envelope(&path, &envelope)).await
    }

    async fn delete(&self, key: &str) -> Result<bool, EngineError> {
        let path = self.path_for(key);
        self.blocking(move |_| {
            let live = read_envelope(&path)?.map_or(false, |e| !e.is_expired(Utc::now()));
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| format!("Failed to delete {:?}: {}", path, e))?;
            }
            Ok(live)
        })
        .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, EngineError> {
        let path = self.path_for(key);
        self.blocking(move |_| match read_envelope(&path)? {
            Some(mut envelope) if !envelope.is_expired(Utc::now()) => {
                envelope.expires_at = expires_at(Some(ttl));
                write_envelope(&path, &envelope)?;
                Ok(true)
            }
            _ => Ok(false),
        })
        .await
    }

    async fn purge_expired(&self) -> Result<Vec<String>, EngineError> {
        self.blocking(|root| {
            let now = Utc::now();
            let mut removed = Vec::new();
            let entries =
                fs::read_dir(&root).map_err(|e| format!("Failed to list {:?}: {}", root, e))?;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match read_envelope(&path) {
                    Ok(Some(envelope)) if envelope.is_expired(now) => {
                        if fs::remove_file(&path).is_ok() {
                            removed.push(envelope.key);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => log::warn!("Skipping unreadable entry: {}", e),
                }
            }
            removed.sort();
            Ok(removed)
        })
        .await
    }
}
