//! Push channel subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket upgrade (http/websocket.rs)
//!     → ChannelEvent::Opened { id, sink } → registry.rs
//!     ... connection lives ...
//!     → ChannelEvent::Closed { id }       → registry.rs
//!
//! Broadcaster::publish(event, args)        (broadcaster.rs)
//!     → registry snapshot
//!     → one queued frame per connection → per-connection writer task
//! ```
//!
//! # Design Decisions
//! - No acknowledgements, redelivery or ordering across connections
//! - Transport errors are indistinguishable from a normal close

pub mod broadcaster;
pub mod registry;

pub use broadcaster::{encode_frame, Broadcaster, PublishReport};
pub use registry::{ChannelEvent, Connection, ConnectionId, ConnectionRegistry, FrameSink};
