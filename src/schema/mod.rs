//! API schema subsystem.
//!
//! # Data Flow
//! ```text
//! swagger.yaml (fixed location from config)
//!     → loader.rs (async read, YAML parse, host/basePath patch)
//!     → document.rs (operation table compiled once)
//!     → Arc<SchemaDocument> handed to the request router
//!
//! Per request:
//!     method + path → document.rs (match operation)
//!     → validator.rs (params/body checks) → Ok(ValidatedParams) | Err(ValidationError)
//! ```
//!
//! # Design Decisions
//! - The document is never mutated after load
//! - Swagger 2.0 parameter model (path, query, header, body, formData)
//! - Validation covers presence, types and enum membership

pub mod document;
pub mod loader;
pub mod validator;

pub use document::{Operation, OperationMatch, Parameter, ParameterLocation, SchemaDocument};
pub use loader::{load, LoadError};
pub use validator::{validate, RequestInput, ValidatedParams, ValidationError, Violation};
