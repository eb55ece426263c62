//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use movies_server::config::ServerConfig;
use movies_server::controllers::ControllerRegistry;
use movies_server::lifecycle::{Context, Shutdown};
use movies_server::schema;
use movies_server::session::{MemoryStore, SessionLayer, SessionStore};
use movies_server::RequestRouter;

pub const BASE: &str = "/api/v1";

/// The schema shipped with the server.
pub fn schema_path() -> PathBuf {
    PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/api/swagger/swagger.yaml"))
}

/// Write a minimal static site into `dir`.
pub fn static_site(dir: &std::path::Path) {
    std::fs::write(dir.join("index.html"), "<h1>movies</h1>").unwrap();
}

/// Defaults pointed at the bundled schema, an ephemeral port and `static_dir`.
pub fn test_config(static_dir: &std::path::Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.schema.path = schema_path().display().to_string();
    config.router.static_dir = static_dir.display().to_string();
    config
}

/// In-process application with the given controllers and an in-memory session store.
pub async fn app(config: &ServerConfig, controllers: ControllerRegistry) -> Router {
    app_with_store(config, controllers, Arc::new(MemoryStore::new())).await
}

/// In-process application backed by a caller-owned session store.
pub async fn app_with_store(
    config: &ServerConfig,
    controllers: ControllerRegistry,
    store: Arc<dyn SessionStore>,
) -> Router {
    let document = schema::load(&schema_path(), config).await.unwrap();
    let sessions = SessionLayer::new(store, config.session.clone());
    RequestRouter::new(Arc::new(document), Arc::new(controllers), config.router.clone())
        .with_sessions(sessions)
        .into_router()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Serve a bootstrapped context in the background.
pub fn spawn(context: Context) -> (SocketAddr, Shutdown) {
    let addr = context.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        context.serve(receiver).await.unwrap();
    });
    (addr, shutdown)
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
