//! Push channel endpoint.
//!
//! # Responsibilities
//! - Complete the WebSocket upgrade on the channel path
//! - Announce the connection to the registry (`Opened` / `Closed`)
//! - Drain the connection's frame queue into the socket
//!
//! # Data Flow
//! ```text
//! Broadcaster ──frames──→ mpsc queue ──writer task──→ Client
//! Client ──frames──→ reader task (ignored, traced)
//! ```
//!
//! # Design Decisions
//! - Registered before the greeting is queued, so a publish racing the
//!   greeting can only arrive after it
//! - Whichever task finishes first ends the connection; errors and normal
//!   closes look the same to the registry
//! - Heartbeat pings keep idle intermediaries from dropping the socket

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use crate::channel::{encode_frame, ChannelEvent, ConnectionId, ConnectionRegistry};

/// Event name of the greeting frame carrying the connection id.
pub const CONNECT_EVENT: &str = "connect";

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Upgrade handler mounted at the channel path.
pub async fn channel_upgrade(
    State(registry): State<Arc<ConnectionRegistry>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

async fn handle_socket(socket: WebSocket, registry: Arc<ConnectionRegistry>) {
    let id = ConnectionId::generate();
    let (sink, mut frames) = mpsc::unbounded_channel::<String>();

    let greeting = encode_frame(CONNECT_EVENT, &[json!(id.as_str())]);
    registry.apply(ChannelEvent::Opened {
        id: id.clone(),
        sink: sink.clone(),
    });
    let _ = sink.send(greeting);
    // the registry now holds the only sender; removing the entry ends the writer
    drop(sink);

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_id = id.clone();
    let mut writer = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    tracing::trace!(connection_id = %writer_id, "Sent ping");
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    let reader_id = id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(message) = ws_rx.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    tracing::trace!(
                        connection_id = %reader_id,
                        len = text.as_str().len(),
                        "Ignoring inbound channel frame"
                    );
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(connection_id = %reader_id, error = %e, "Channel read error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    registry.apply(ChannelEvent::Closed { id });
}
