//! Fan-out publish over the connection registry.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::channel::registry::ConnectionRegistry;
use crate::observability::metrics;

/// Frame pushed to every connection.
#[derive(Debug, Serialize)]
struct EventFrame<'a> {
    event: &'a str,
    args: &'a [Value],
}

/// Serialize an event frame as sent on the wire.
pub fn encode_frame(event: &str, args: &[Value]) -> String {
    serde_json::to_string(&EventFrame { event, args })
        .unwrap_or_else(|_| format!(r#"{{"event":{event:?},"args":[]}}"#))
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Connections in the snapshot; one send was attempted for each.
    pub attempted: usize,
    /// Sends that found the connection already gone.
    pub dropped: usize,
}

/// Fire-and-forget event announcements to all open connections.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Send `event` with `args` once to every connection open right now.
    ///
    /// Connections opened after the snapshot is taken may miss the event;
    /// connections that closed since are skipped silently. No retries.
    pub fn publish(&self, event: &str, args: Vec<Value>) -> PublishReport {
        let frame = encode_frame(event, &args);
        let snapshot = self.registry.snapshot();

        let mut report = PublishReport {
            attempted: snapshot.len(),
            dropped: 0,
        };
        for connection in snapshot {
            if !connection.send(frame.clone()) {
                report.dropped += 1;
                tracing::debug!(
                    connection_id = %connection.id,
                    event = %event,
                    "Dropped event for closed connection"
                );
            }
        }

        tracing::trace!(
            event = %event,
            attempted = report.attempted,
            dropped = report.dropped,
            "Event published"
        );
        metrics::record_broadcast(event, report.attempted, report.dropped);
        report
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }
}
