//! Schema document loading.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::ServerConfig;
use crate::schema::document::SchemaDocument;

/// Error type for schema loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read schema {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse schema {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("schema root must be a mapping")]
    NotAMapping,
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// Read, parse and patch the schema document at `path`.
///
/// `host` and `basePath` are overwritten from `service.host` and
/// `service.pathname` before the operation table is compiled.
pub async fn load(path: &Path, config: &ServerConfig) -> Result<SchemaDocument, LoadError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let raw: Value = serde_yaml::from_str(&content).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let host = config.get("service.host").unwrap_or_default();
    let base_path = config.get("service.pathname").unwrap_or_default();

    let document = SchemaDocument::from_value(raw, &host, &base_path)?;

    tracing::debug!(
        path = ?path,
        host = %document.host(),
        base_path = %document.base_path(),
        operations = document.operations().len(),
        "Schema document loaded"
    );

    Ok(document)
}
