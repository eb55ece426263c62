//! HTTP server.
//!
//! # Responsibilities
//! - Accept connections on the listener bound during bootstrap
//! - Serve the assembled application (REST, docs, static and channel)
//! - Stop accepting and drain in-flight requests on shutdown

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub fn new(router: Router, listener: TcpListener) -> Self {
        Self { router, listener }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires (or its sender is dropped).
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        let addr = self.listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .finish()
    }
}
