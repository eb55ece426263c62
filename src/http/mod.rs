//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (listener bound during bootstrap)
//!     → server.rs (axum::serve, graceful shutdown)
//!     → request.rs (request id assigned and echoed)
//!     → router/ (CORS, sessions, schema pipeline)
//!         ├─ websocket.rs (channel upgrade on the same port)
//!         └─ response.rs (validation and fault envelopes)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
