//! Schema-validated REST API server with a live push channel.
//!
//! Startup runs a fixed sequence of bootstrap stages (see [`lifecycle`])
//! that assemble the schema, transport, channel, cache, services,
//! controllers and router into one [`Context`].

pub mod cache;
pub mod channel;
pub mod config;
pub mod controllers;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod router;
pub mod schema;
pub mod services;
pub mod session;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Bootstrap, Context, Shutdown};
pub use router::RequestRouter;
