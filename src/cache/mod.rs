//! Cache handle.
//!
//! Acquired once during bootstrap from `cache.url` and shared by cloning.
//! The in-process backend keeps JSON values with optional expiry; other
//! schemes fail acquisition, which aborts startup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use url::Url;

use crate::config::CacheConfig;

/// Error type for cache acquisition.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("invalid cache url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported cache backend '{0}'")]
    UnsupportedBackend(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct MemoryCache {
    entries: DashMap<String, Entry>,
}

#[derive(Debug)]
enum Backend {
    Memory(MemoryCache),
}

/// Opaque handle to the cache store.
#[derive(Debug, Clone)]
pub struct CacheClient {
    backend: Arc<Backend>,
}

impl CacheClient {
    /// Acquire a client for the configured url.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = Url::parse(&config.url).map_err(|source| CacheError::InvalidUrl {
            url: config.url.clone(),
            source,
        })?;
        match url.scheme() {
            "memory" => Ok(Self::in_memory()),
            other => Err(CacheError::UnsupportedBackend(other.to_string())),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(Backend::Memory(MemoryCache::default())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.backend.as_ref() {
            Backend::Memory(cache) => {
                let entry = cache.entries.get(key).map(|e| e.value().clone())?;
                if entry.is_live(Instant::now()) {
                    Some(entry.value)
                } else {
                    cache.entries.remove(key);
                    None
                }
            }
        }
    }

    /// Store `value`, optionally expiring after `ttl`.
    pub async fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        match self.backend.as_ref() {
            Backend::Memory(cache) => {
                let expires_at = ttl.map(|ttl| Instant::now() + ttl);
                cache.entries.insert(key.into(), Entry { value, expires_at });
            }
        }
    }

    /// Remove a key; returns whether a live entry was present.
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.as_ref() {
            Backend::Memory(cache) => cache
                .entries
                .remove(key)
                .is_some_and(|(_, entry)| entry.is_live(Instant::now())),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        match self.backend.as_ref() {
            Backend::Memory(cache) => {
                let now = Instant::now();
                cache.entries.retain(|_, entry| entry.is_live(now));
                cache.entries.len()
            }
        }
    }
}
