//! Live channel connection registry.
//!
//! # Responsibilities
//! - Track open channel connections by id
//! - Consume `Opened`/`Closed` events from per-connection sources
//! - Hand out point-in-time snapshots for fan-out
//!
//! # State Machine
//! ```text
//! Opened → OPEN → Closed → (removed)
//! ```
//!
//! # Design Decisions
//! - Key set equals exactly the open connections
//! - Closing an unknown id is a no-op
//! - Outbound sinks are unbounded queues so one slow reader never blocks others

use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::observability::metrics;

/// Opaque connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConnectionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for ConnectionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound half of a connection: serialized frames queued for its writer.
pub type FrameSink = mpsc::UnboundedSender<String>;

/// Lifecycle notification emitted by a connection's event source.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened { id: ConnectionId, sink: FrameSink },
    Closed { id: ConnectionId },
}

/// One open connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub created_at: DateTime<Utc>,
    sink: FrameSink,
}

impl Connection {
    /// Queue a frame. Returns false when the connection's writer is gone.
    pub fn send(&self, frame: String) -> bool {
        self.sink.send(frame).is_ok()
    }
}

/// Registry of open channel connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one lifecycle event.
    pub fn apply(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened { id, sink } => {
                tracing::debug!(connection_id = %id, "Channel connection opened");
                let connection = Connection {
                    id: id.clone(),
                    created_at: Utc::now(),
                    sink,
                };
                self.connections.insert(id, connection);
            }
            ChannelEvent::Closed { id } => {
                if self.connections.remove(&id).is_some() {
                    tracing::debug!(connection_id = %id, "Channel connection closed");
                }
            }
        }
        metrics::record_channel_connections(self.connections.len());
    }

    /// Is this id currently open?
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Connection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Number of open connections.
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Ids currently registered.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|e| e.key().clone()).collect()
    }

    /// Copy of all connections open at this instant.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }
}
