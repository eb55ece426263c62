//! Schema-driven request router.
//!
//! # Data Flow
//! ```text
//! Request
//!     → request id / tracing (http/request.rs, tower-http)
//!     → cors.rs (OPTIONS answered here)
//!     → timeout (408 after router timeout)
//!     → session middleware (session/middleware.rs)
//!     → channel upgrade at {basePath}{channel.path} (http/websocket.rs)
//!     → pipeline.rs: metadata → validation → dispatch → fault fallback
//!     → docs.rs ({basePath}/api-docs, {basePath}/docs)
//!     → static files (router.static_dir)
//! ```
//!
//! # Design Decisions
//! - The stage order is fixed at construction; nothing is mounted later
//! - Preflight requests never touch the session store
//! - Validation always precedes dispatch; the fault stage only sees
//!   controller errors and panics

pub mod cors;
pub mod docs;
mod pipeline;

use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::channel::ConnectionRegistry;
use crate::config::RouterConfig;
use crate::controllers::ControllerRegistry;
use crate::http::{request, websocket};
use crate::schema::SchemaDocument;
use crate::session::{session_middleware, SessionLayer};

use pipeline::PipelineState;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct ChannelMount {
    registry: Arc<ConnectionRegistry>,
    path: String,
}

/// Builder for the HTTP application.
pub struct RequestRouter {
    schema: Arc<SchemaDocument>,
    controllers: Arc<ControllerRegistry>,
    config: RouterConfig,
    timeout: Duration,
    channel: Option<ChannelMount>,
    sessions: Option<SessionLayer>,
}

impl RequestRouter {
    pub fn new(
        schema: Arc<SchemaDocument>,
        controllers: Arc<ControllerRegistry>,
        config: RouterConfig,
    ) -> Self {
        Self {
            schema,
            controllers,
            config,
            timeout: DEFAULT_TIMEOUT,
            channel: None,
            sessions: None,
        }
    }

    /// Mount the push channel endpoint at `path` (absolute).
    pub fn with_channel(mut self, registry: Arc<ConnectionRegistry>, path: impl Into<String>) -> Self {
        self.channel = Some(ChannelMount {
            registry,
            path: path.into(),
        });
        self
    }

    pub fn with_sessions(mut self, sessions: SessionLayer) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn schema(&self) -> &Arc<SchemaDocument> {
        &self.schema
    }

    /// Assemble the layered axum application.
    #[allow(deprecated)]
    pub fn into_router(self) -> Router {
        let static_files = ServeDir::new(&self.config.static_dir);
        let state = PipelineState {
            schema: self.schema,
            controllers: self.controllers,
            config: Arc::new(self.config),
            static_files,
        };

        let mut app: Router<PipelineState> = Router::new();
        if let Some(channel) = self.channel {
            tracing::debug!(path = %channel.path, "Channel endpoint mounted");
            app = app.route(
                &channel.path,
                get(websocket::channel_upgrade).with_state(channel.registry),
            );
        }
        let mut app = app.fallback(pipeline::handle).with_state(state);

        if let Some(sessions) = self.sessions {
            app = app.layer(middleware::from_fn_with_state(sessions, session_middleware));
        }

        // timeout sits inside CORS so a 408 still carries the CORS headers
        app.layer(TimeoutLayer::new(self.timeout))
            .layer(middleware::from_fn(cors::cors_middleware))
            .layer(request::propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(request::set_request_id_layer())
    }
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRouter")
            .field("base_path", &self.schema.base_path())
            .field("controllers", &self.controllers.len())
            .field("channel", &self.channel.as_ref().map(|c| &c.path))
            .field("sessions", &self.sessions.is_some())
            .finish()
    }
}
