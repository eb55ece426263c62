//! Domain services.
//!
//! # Data Flow
//! ```text
//! Bootstrap context (config, session store, registry, broadcaster, cache)
//!     → ServiceDeps
//!     → Services::build (one instance of each service)
//!     → controllers (controllers/) hold Arc handles
//! ```

pub mod movies;

use std::sync::Arc;

use crate::cache::CacheClient;
use crate::channel::{Broadcaster, ConnectionRegistry};
use crate::config::ServerConfig;
use crate::session::SessionStore;

pub use movies::{Genre, Movie, MovieError, MovieQuery, MovieService, NewMovie};

/// Everything a domain service may depend on.
#[derive(Debug, Clone)]
pub struct ServiceDeps {
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<dyn SessionStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub cache: CacheClient,
}

/// Built domain services.
#[derive(Debug, Clone)]
pub struct Services {
    pub movies: Arc<MovieService>,
}

impl Services {
    pub fn build(deps: &ServiceDeps) -> Self {
        let movies = Arc::new(MovieService::new(
            deps.cache.clone(),
            deps.broadcaster.clone(),
        ));
        tracing::debug!(
            endpoint = %deps.config.rest_endpoint(),
            open_connections = deps.registry.count(),
            "Domain services built"
        );
        Self { movies }
    }
}
