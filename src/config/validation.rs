//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate address formats and path shapes
//! - Reject empty connection strings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every issue found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if !config.service.protocol.ends_with("://") {
        issues.push(ConfigIssue::new(
            "service.protocol",
            "must end with '://'",
        ));
    }

    let pathname = &config.service.pathname;
    if !pathname.is_empty() && (!pathname.starts_with('/') || pathname.ends_with('/')) {
        issues.push(ConfigIssue::new(
            "service.pathname",
            "must be empty or start with '/' and not end with '/'",
        ));
    }

    if config.db.trim().is_empty() {
        issues.push(ConfigIssue::new("db", "connection string is empty"));
    }

    if config.cache.url.trim().is_empty() {
        issues.push(ConfigIssue::new("cache.url", "connection string is empty"));
    }

    if config.schema.path.trim().is_empty() {
        issues.push(ConfigIssue::new("schema.path", "path is empty"));
    }

    if !config.channel.path.starts_with('/') {
        issues.push(ConfigIssue::new("channel.path", "must start with '/'"));
    }

    if config.session.sweep_interval_secs == 0 {
        issues.push(ConfigIssue::new(
            "session.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    if config.router.max_body_bytes == 0 {
        issues.push(ConfigIssue::new(
            "router.max_body_bytes",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
