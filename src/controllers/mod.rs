//! Controller registry and dispatch contract.
//!
//! # Data Flow
//! ```text
//! matched operation → handler name (`{controller}_{operationId}`)
//!     → ControllerRegistry::get
//!     → Controller::handle(OperationRequest) → Response | HandlerError
//! ```
//!
//! # Design Decisions
//! - Registry is built once during bootstrap and read-only afterwards
//! - Any `Fn(OperationRequest) -> impl Future` is a controller
//! - Controllers own the full response; the router returns it unmodified

pub mod movies;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{Map, Value};

use crate::session::Session;

/// Error a controller hands back to the router's fault stage.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A validated request, as seen by a controller.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation_id: String,
    /// Path template the request matched, e.g. `/movies/{id}`.
    pub template: String,
    /// Coerced non-body parameters by name.
    pub params: Map<String, Value>,
    pub body: Option<Value>,
    pub session: Option<Session>,
    pub request_id: Option<String>,
}

impl OperationRequest {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }
}

#[async_trait]
pub trait Controller: Send + Sync {
    async fn handle(&self, request: OperationRequest) -> Result<Response, HandlerError>;
}

#[async_trait]
impl<F, Fut> Controller for F
where
    F: Fn(OperationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    async fn handle(&self, request: OperationRequest) -> Result<Response, HandlerError> {
        (self)(request).await
    }
}

/// Handler name → controller.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    controllers: BTreeMap<String, Arc<dyn Controller>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a controller, replacing any previous one under `name`.
    pub fn register<C>(&mut self, name: impl Into<String>, controller: C) -> &mut Self
    where
        C: Controller + 'static,
    {
        let name = name.into();
        if self.controllers.insert(name.clone(), Arc::new(controller)).is_some() {
            tracing::warn!(handler = %name, "Controller replaced");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Controller>> {
        self.controllers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("handlers", &self.controllers.keys().collect::<Vec<_>>())
            .finish()
    }
}
