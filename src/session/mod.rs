//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request (Cookie: sid=<token>)
//!     → middleware.rs (parse token, load from store or start fresh)
//!     → Session extension visible to controllers
//!     → middleware.rs (save if new or modified, Set-Cookie if new)
//! ```
//!
//! # Design Decisions
//! - Store is acquired once from the `db` connection string (store.rs)
//! - Cookie is HttpOnly and, by default, Secure
//! - Store failures never fail a request; they are logged
//! - Expired records are swept periodically while serving (sweeper.rs)
//! - Tokens are random UUIDs; malformed tokens are treated as absent

pub mod middleware;
pub mod store;
pub mod sweeper;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use uuid::Uuid;

pub use middleware::{session_middleware, SessionLayer};
pub use store::{connect, FileStore, MemoryStore, SessionRecord, SessionStore};
pub use sweeper::SessionSweeper;

/// Error type for session storage.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session store url: {0}")]
    InvalidUrl(String),
    #[error("unsupported session store backend '{0}'")]
    UnsupportedBackend(String),
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt session record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Session token carried by the cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accept only tokens this server could have issued.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit());
        well_formed.then(|| Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct SessionState {
    data: Map<String, Value>,
    modified: bool,
}

/// Handle to the current request's session state.
///
/// Cloning shares the same state; the middleware reads it back after the
/// handler has run.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    is_new: bool,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn fresh() -> Self {
        Self::with_state(SessionId::generate(), Map::new(), true)
    }

    fn resumed(id: SessionId, data: Map<String, Value>) -> Self {
        Self::with_state(id, data, false)
    }

    fn with_state(id: SessionId, data: Map<String, Value>, is_new: bool) -> Self {
        Self {
            id,
            is_new,
            state: Arc::new(Mutex::new(SessionState {
                data,
                modified: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// True when this request started the session.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut state = self.lock();
        state.data.insert(key.into(), value);
        state.modified = true;
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.modified = true;
        }
        removed
    }

    /// Copy of the current data.
    pub fn data(&self) -> Map<String, Value> {
        self.lock().data.clone()
    }
}
