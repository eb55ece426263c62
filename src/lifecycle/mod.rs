//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     ServerConfig → Bootstrap stages (strictly sequential) → Context
//!
//! Serve:
//!     Context::serve(shutdown receiver) → HTTP server on the bound listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger (shutdown.rs)
//!
//! Shutdown:
//!     Stop accepting → Drain in-flight requests → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: schema, transport, channel, cache, services,
//!   controllers, router
//! - The first failing stage aborts startup with a single error

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Bootstrap, BootstrapContext, BootstrapError, Context, Stage, StageError};
