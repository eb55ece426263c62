//! Session store contract and backends.
//!
//! # Responsibilities
//! - Define the async contract the session middleware relies on
//! - Provide the in-process and file-backed stores
//! - Acquire a store from the `db` connection string
//!
//! # Design Decisions
//! - Stores own expiry: an expired record loads as absent
//! - Expired records that are never loaded again are removed by
//!   `purge_expired`, which the sweeper calls periodically
//! - File store writes one JSON document per session, named by its id

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::session::{SessionError, SessionId};

/// Persisted session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Durable session storage.
#[async_trait]
pub trait SessionStore: Send + Sync + fmt::Debug {
    /// Load an unexpired record.
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError>;

    /// Insert or replace a record.
    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<(), SessionError>;

    /// Remove a record; absent ids are not an error.
    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError>;

    /// Drop every expired record, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;
}

/// Acquire the store named by a connection string.
///
/// Supported schemes: `memory://` and `file:///<directory>`.
pub async fn connect(db: &str) -> Result<Arc<dyn SessionStore>, SessionError> {
    let url = Url::parse(db).map_err(|e| SessionError::InvalidUrl(format!("{db}: {e}")))?;
    match url.scheme() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "file" => {
            let dir = url
                .to_file_path()
                .map_err(|_| SessionError::InvalidUrl(format!("{db}: not a local path")))?;
            Ok(Arc::new(FileStore::open(dir).await?))
        }
        other => Err(SessionError::UnsupportedBackend(other.to_string())),
    }
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<SessionId, SessionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let record = self.records.get(id).map(|r| r.value().clone());
        match record {
            Some(record) if record.is_expired() => {
                self.records.remove(id);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<(), SessionError> {
        self.records.insert(id.clone(), record.clone());
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        self.records.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired());
        Ok(before.saturating_sub(self.records.len()))
    }
}

/// Directory of JSON files, one per session.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store directory.
    pub async fn open(dir: PathBuf) -> Result<Self, SessionError> {
        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(dir = ?dir, "File session store opened");
        Ok(Self { dir })
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: SessionRecord = serde_json::from_slice(&bytes)?;
        if record.is_expired() {
            self.destroy(id).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn save(&self, id: &SessionId, record: &SessionRecord) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec(record)?;
        let path = self.path_for(id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // destroyed concurrently
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            let record: SessionRecord = match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = ?path, error = %e, "Skipping unreadable session file");
                    continue;
                }
            };
            if record.is_expired() {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(removed)
    }
}
