//! Startup error type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::LoggingError;

/// Any failure that aborts startup before traffic is accepted.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("invalid listen address: {0}")]
    BindAddress(#[from] std::net::AddrParseError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}
