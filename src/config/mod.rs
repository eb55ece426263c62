//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Dotted key-path lookup (`service.host`) for the few values the
//!   schema loader and session store read by name

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, ChannelConfig, ListenerConfig, ObservabilityConfig, RouterConfig, SchemaConfig,
    ServerConfig, ServiceConfig, SessionConfig, TimeoutConfig,
};
