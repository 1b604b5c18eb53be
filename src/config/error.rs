//! Configuration error definitions.

use thiserror::Error;

/// Errors raised while resolving, loading or fetching configuration.
///
/// Every variant is fatal during startup; nothing here is retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A boolean flag (environment variable or local setting) is malformed.
    #[error("invalid boolean '{value}' in {source_name}")]
    InvalidBoolean { source_name: String, value: String },

    /// The remote configuration store connection string is empty or missing.
    #[error("remote configuration connection string is not configured ({0})")]
    ConfigurationUnavailable(String),

    /// A connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// Local settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Local settings file is not valid TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Transport-level failure talking to the store, vault or identity endpoint.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A remote endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    RemoteStatus { url: String, status: u16 },

    /// A secret-store reference could not be resolved.
    #[error("failed to resolve secret reference for '{key}': {reason}")]
    Secret { key: String, reason: String },

    /// No credential source is available to authenticate against the secret store.
    #[error("credential unavailable: {0}")]
    Credential(String),
}

impl ConfigError {
    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        ConfigError::Http {
            url: url.into(),
            source,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
