//! Pluggable shared storage medium.
//!
//! Coordination state lives in a key-addressed record store shared by every
//! agent process. The medium only has to offer atomic per-record replace;
//! nothing in the core performs a multi-record update that would need a
//! cross-record transaction.

use crate::{MeshError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Key-addressed record store. Keys are `/`-separated namespaces such as
/// `agents/<agent_id>` or `inbox/<agent_id>/<message_id>`; records are JSON
/// documents. `list` enumerates the direct children of a namespace.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SharedStore: Send + Sync {
    async fn put(&self, key: &str, record: Value) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn list(&self, prefix: &str) -> Result<Vec<Value>>;
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if !valid {
        return Err(MeshError::Validation(format!("Invalid storage key '{}'", key)));
    }
    Ok(())
}

/// Reference storage medium: a shared filesystem directory with one JSON
/// file per entity. Replacement is atomic via write-to-temp plus rename, so
/// concurrent writers of the same key settle last-write-wins without ever
/// exposing a torn record.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = key.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{}.json", segment));
            }
        }
        path
    }
}

#[async_trait]
impl SharedStore for FsStore {
    async fn put(&self, key: &str, record: Value) -> Result<()> {
        validate_key(key)?;
        let path = self.record_path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Writers each use a unique temp file so racing processes never
        // rename a half-written record into place.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let bytes = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(err) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| MeshError::Storage(format!("Corrupt record at '{}': {}", key, err)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Value>> {
        validate_key(prefix.trim_end_matches('/'))?;
        let mut dir = self.root.clone();
        for segment in prefix.split('/').filter(|segment| !segment.is_empty()) {
            dir.push(segment);
        }

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|ext| ext == "json") != Some(true) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let record = serde_json::from_slice(&bytes).map_err(|err| {
                MeshError::Storage(format!("Corrupt record at '{}': {}", path.display(), err))
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// In-memory store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn put(&self, key: &str, record: Value) -> Result<()> {
        validate_key(key)?;
        self.records.write().insert(key.to_string(), record);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        Ok(self.records.read().get(key).cloned())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<Value>> {
        validate_key(prefix.trim_end_matches('/'))?;
        let records = self.records.read();
        Ok(records
            .iter()
            .filter(|(key, _)| {
                key.strip_prefix(prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .map(|(_, record)| record.clone())
            .collect())
    }
}
