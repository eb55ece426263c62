//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Public service coordinates, patched into the schema document.
    pub service: ServiceConfig,

    /// Session store connection string (e.g. "memory://", "file:///var/lib/sessions").
    pub db: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// API schema document location.
    pub schema: SchemaConfig,

    /// Session cookie settings.
    pub session: SessionConfig,

    /// Cache handle settings.
    pub cache: CacheConfig,

    /// Push channel settings.
    pub channel: ChannelConfig,

    /// Request pipeline settings.
    pub router: RouterConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            db: "memory://".to_string(),
            listener: ListenerConfig::default(),
            schema: SchemaConfig::default(),
            session: SessionConfig::default(),
            cache: CacheConfig::default(),
            channel: ChannelConfig::default(),
            router: RouterConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Look up a value by dotted key path (e.g. `service.host`).
    ///
    /// Strings are returned verbatim; other leaves use their TOML rendering.
    /// Returns `None` for unknown keys and for non-leaf tables.
    pub fn get(&self, key: &str) -> Option<String> {
        let root = toml::Value::try_from(self).ok()?;
        let mut current = &root;
        for segment in key.split('.') {
            current = current.get(segment)?;
        }
        match current {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Table(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Protocol, host and base path joined into the advertised endpoint.
    pub fn rest_endpoint(&self) -> String {
        format!(
            "{}{}{}",
            self.service.protocol, self.service.host, self.service.pathname
        )
    }
}

/// Public service coordinates.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scheme prefix including separator (e.g. "https://").
    pub protocol: String,

    /// Public host (and optional port).
    pub host: String,

    /// Base path all API operations are mounted under.
    pub pathname: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            protocol: "http://".to_string(),
            host: "localhost:8080".to_string(),
            pathname: "/api/v1".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Path to the schema document (YAML or JSON).
    pub path: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: "api/swagger/swagger.yaml".to_string(),
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie carrying the session token.
    pub cookie_name: String,

    /// Session lifetime in seconds (store expiry and cookie Max-Age).
    pub max_age_secs: u64,

    /// Mark the cookie Secure (sent over TLS only).
    pub secure: bool,

    /// Seconds between sweeps of expired sessions.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            max_age_secs: 14 * 24 * 3600,
            secure: true,
            sweep_interval_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache connection string.
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "memory://".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel endpoint path, relative to the base path.
    pub path: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path: "/socket".to_string(),
        }
    }
}

/// Request pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Directory served by the static asset stage.
    pub static_dir: String,

    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,

    /// Answer validation failures with 400 and violation details
    /// instead of the opaque `{"error": true}` envelope.
    pub detailed_validation_errors: bool,

    /// Return raw controller error text in 500 responses.
    pub expose_fault_details: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            static_dir: "public".to_string(),
            max_body_bytes: 1024 * 1024,
            detailed_validation_errors: false,
            expose_fault_details: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
