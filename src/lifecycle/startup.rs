//! Startup orchestration.
//!
//! # Responsibilities
//! - Run the bootstrap stages strictly in order, each one enriching the
//!   context built by the ones before it
//! - Stop at the first failure and report which stage failed
//! - Hand the finished `Context` to the caller, ready to serve
//!
//! # Stage Order
//! ```text
//! load-schema → bind-transport → open-channel → acquire-cache
//!     → build-services → register-controllers → build-router
//! ```
//!
//! # Design Decisions
//! - Fail fast: any stage error is fatal and later stages never start
//! - Stages initialize in order, not concurrently
//! - The listener is bound early but only accepts once `serve` is called

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::cache::{CacheClient, CacheError};
use crate::channel::{Broadcaster, ConnectionRegistry};
use crate::config::ServerConfig;
use crate::controllers::{self, ControllerRegistry};
use crate::http::HttpServer;
use crate::router::RequestRouter;
use crate::schema::{self, LoadError, SchemaDocument};
use crate::services::{ServiceDeps, Services};
use crate::session::{self, SessionError, SessionLayer, SessionStore, SessionSweeper};

/// Why a single stage failed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Schema(#[from] LoadError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),
    #[error("{0} is not initialized")]
    Missing(&'static str),
    #[error("{0}")]
    Other(String),
}

/// The first stage failure, tagged with the stage name.
#[derive(Debug, thiserror::Error)]
#[error("bootstrap stage '{stage}' failed: {source}")]
pub struct BootstrapError {
    pub stage: &'static str,
    #[source]
    pub source: StageError,
}

/// Partially assembled context threaded through the stages.
#[derive(Debug)]
pub struct BootstrapContext {
    pub config: Arc<ServerConfig>,
    pub schema: Option<Arc<SchemaDocument>>,
    pub listener: Option<TcpListener>,
    pub sessions: Option<Arc<dyn SessionStore>>,
    pub registry: Option<Arc<ConnectionRegistry>>,
    pub broadcaster: Option<Broadcaster>,
    pub cache: Option<CacheClient>,
    pub services: Option<Services>,
    pub controllers: Option<Arc<ControllerRegistry>>,
    pub router: Option<Router>,
}

impl BootstrapContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            schema: None,
            listener: None,
            sessions: None,
            registry: None,
            broadcaster: None,
            cache: None,
            services: None,
            controllers: None,
            router: None,
        }
    }

    /// Convert into a complete `Context`, naming the first missing part.
    pub fn finish(self) -> Result<Context, StageError> {
        Ok(Context {
            schema: self.schema.ok_or(StageError::Missing("schema"))?,
            listener: self.listener.ok_or(StageError::Missing("transport"))?,
            sessions: self.sessions.ok_or(StageError::Missing("session store"))?,
            registry: self.registry.ok_or(StageError::Missing("connection registry"))?,
            broadcaster: self.broadcaster.ok_or(StageError::Missing("broadcaster"))?,
            cache: self.cache.ok_or(StageError::Missing("cache"))?,
            services: self.services.ok_or(StageError::Missing("services"))?,
            controllers: self.controllers.ok_or(StageError::Missing("controllers"))?,
            router: self.router.ok_or(StageError::Missing("router"))?,
            config: self.config,
        })
    }
}

/// Fully assembled runtime.
#[derive(Debug)]
pub struct Context {
    pub config: Arc<ServerConfig>,
    pub schema: Arc<SchemaDocument>,
    pub listener: TcpListener,
    pub sessions: Arc<dyn SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub cache: CacheClient,
    pub services: Services,
    pub controllers: Arc<ControllerRegistry>,
    pub router: Router,
}

impl Context {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Start accepting traffic; returns after graceful shutdown.
    ///
    /// The session sweeper runs alongside the server and stops on the same
    /// shutdown signal.
    pub async fn serve(self, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let sweeper = SessionSweeper::new(
            Arc::clone(&self.sessions),
            Duration::from_secs(self.config.session.sweep_interval_secs),
        );
        let sweeping = tokio::spawn(sweeper.run(shutdown.resubscribe()));

        let served = HttpServer::new(self.router, self.listener).run(shutdown).await;
        sweeping.abort();
        served
    }
}

/// One step of the bootstrap sequence.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: BootstrapContext) -> Result<BootstrapContext, StageError>;
}

/// Ordered list of stages.
pub struct Bootstrap {
    stages: Vec<Box<dyn Stage>>,
}

impl Bootstrap {
    /// An empty sequence; add stages with [`Bootstrap::stage`].
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// The production sequence.
    pub fn standard() -> Self {
        Self::new()
            .stage(LoadSchema)
            .stage(BindTransport)
            .stage(OpenChannel)
            .stage(AcquireCache)
            .stage(BuildServices)
            .stage(RegisterControllers)
            .stage(BuildRouter)
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first failure.
    pub async fn execute(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, BootstrapError> {
        let started = Instant::now();
        for stage in &self.stages {
            let name = stage.name();
            let stage_start = Instant::now();
            tracing::info!(stage = name, "Bootstrap stage starting");

            ctx = match stage.run(ctx).await {
                Ok(ctx) => ctx,
                Err(source) => {
                    tracing::error!(stage = name, error = %source, "Bootstrap stage failed");
                    return Err(BootstrapError { stage: name, source });
                }
            };

            tracing::info!(
                stage = name,
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                "Bootstrap stage complete"
            );
        }
        tracing::info!(
            stages = self.stages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bootstrap complete"
        );
        Ok(ctx)
    }

    /// Run the sequence from `config` and return the finished context.
    pub async fn run(&self, config: ServerConfig) -> Result<Context, BootstrapError> {
        let ctx = self.execute(BootstrapContext::new(config)).await?;
        ctx.finish().map_err(|source| BootstrapError {
            stage: "finish",
            source,
        })
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Read and patch the API schema.
#[derive(Debug, Clone, Copy)]
pub struct LoadSchema;

#[async_trait]
impl Stage for LoadSchema {
    fn name(&self) -> &'static str {
        "load-schema"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        let path = std::path::PathBuf::from(&ctx.config.schema.path);
        let document = schema::load(&path, &ctx.config).await?;
        tracing::info!(
            path = %path.display(),
            operations = document.operations().len(),
            "Schema loaded"
        );
        ctx.schema = Some(Arc::new(document));
        Ok(ctx)
    }
}

/// Acquire the session store and bind the shared listener.
#[derive(Debug, Clone, Copy)]
pub struct BindTransport;

#[async_trait]
impl Stage for BindTransport {
    fn name(&self) -> &'static str {
        "bind-transport"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        if ctx.listener.is_some() {
            return Err(StageError::AlreadyInitialized("transport"));
        }

        let db = ctx.config.get("db").unwrap_or_default();
        let sessions = session::connect(&db).await?;

        let address = ctx.config.listener.bind_address.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| StageError::Bind {
                address: address.clone(),
                source,
            })?;
        let local = listener
            .local_addr()
            .map_err(|source| StageError::Bind { address, source })?;

        tracing::info!(
            address = %local,
            endpoint = %ctx.config.rest_endpoint(),
            "Transport bound"
        );
        ctx.sessions = Some(sessions);
        ctx.listener = Some(listener);
        Ok(ctx)
    }
}

/// Create the connection registry and its broadcaster.
#[derive(Debug, Clone, Copy)]
pub struct OpenChannel;

#[async_trait]
impl Stage for OpenChannel {
    fn name(&self) -> &'static str {
        "open-channel"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        if ctx.listener.is_none() {
            return Err(StageError::Missing("transport"));
        }
        let registry = Arc::new(ConnectionRegistry::new());
        ctx.broadcaster = Some(Broadcaster::new(Arc::clone(&registry)));
        ctx.registry = Some(registry);
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AcquireCache;

#[async_trait]
impl Stage for AcquireCache {
    fn name(&self) -> &'static str {
        "acquire-cache"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        let cache = CacheClient::connect(&ctx.config.cache).await?;
        ctx.cache = Some(cache);
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildServices;

#[async_trait]
impl Stage for BuildServices {
    fn name(&self) -> &'static str {
        "build-services"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        let deps = ServiceDeps {
            config: Arc::clone(&ctx.config),
            sessions: ctx.sessions.clone().ok_or(StageError::Missing("session store"))?,
            registry: ctx.registry.clone().ok_or(StageError::Missing("connection registry"))?,
            broadcaster: ctx.broadcaster.clone().ok_or(StageError::Missing("broadcaster"))?,
            cache: ctx.cache.clone().ok_or(StageError::Missing("cache"))?,
        };
        ctx.services = Some(Services::build(&deps));
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterControllers;

#[async_trait]
impl Stage for RegisterControllers {
    fn name(&self) -> &'static str {
        "register-controllers"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        let services = ctx.services.as_ref().ok_or(StageError::Missing("services"))?;
        let mut registry = ControllerRegistry::new();
        controllers::movies::register(&mut registry, Arc::clone(&services.movies));

        if let Some(schema) = &ctx.schema {
            for operation in schema.operations() {
                match operation.handler_name() {
                    Some(name) if !registry.contains(&name) => tracing::warn!(
                        handler = %name,
                        method = %operation.method,
                        path = %operation.template,
                        "Operation has no controller"
                    ),
                    _ => {}
                }
            }
        }

        tracing::info!(handlers = registry.len(), "Controllers registered");
        ctx.controllers = Some(Arc::new(registry));
        Ok(ctx)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuildRouter;

#[async_trait]
impl Stage for BuildRouter {
    fn name(&self) -> &'static str {
        "build-router"
    }

    async fn run(&self, mut ctx: BootstrapContext) -> Result<BootstrapContext, StageError> {
        let schema = ctx.schema.clone().ok_or(StageError::Missing("schema"))?;
        let controllers = ctx.controllers.clone().ok_or(StageError::Missing("controllers"))?;
        let sessions = ctx.sessions.clone().ok_or(StageError::Missing("session store"))?;
        let registry = ctx.registry.clone().ok_or(StageError::Missing("connection registry"))?;

        let channel_path = channel_path(schema.base_path(), &ctx.config.channel.path);
        tracing::info!(
            base_path = %schema.base_path(),
            channel = %channel_path,
            "Request router assembled"
        );

        let router = RequestRouter::new(schema, controllers, ctx.config.router.clone())
            .with_timeout(Duration::from_secs(ctx.config.timeouts.request_secs))
            .with_sessions(SessionLayer::new(sessions, ctx.config.session.clone()))
            .with_channel(registry, channel_path)
            .into_router();
        ctx.router = Some(router);
        Ok(ctx)
    }
}

/// Absolute channel path under the base path.
pub fn channel_path(base_path: &str, channel: &str) -> String {
    format!("{}{}", base_path.trim_end_matches('/'), channel)
}
