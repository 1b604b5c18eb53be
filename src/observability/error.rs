//! Logging setup errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    /// The required telemetry credential is absent or empty.
    #[error("telemetry connection string '{0}' is not configured")]
    MissingTelemetryCredential(&'static str),

    /// The telemetry credential is present but unusable.
    #[error("invalid telemetry connection string: {0}")]
    InvalidTelemetryCredential(String),

    /// A configured level name is not recognised.
    #[error("unknown log level '{0}'")]
    InvalidLevel(String),

    /// The level directives could not be assembled into a filter.
    #[error("invalid level directives: {0}")]
    InvalidDirectives(String),

    /// The file sink could not be created.
    #[error("failed to create file sink in {directory}: {reason}")]
    FileSink { directory: String, reason: String },

    /// The telemetry client needs a running async runtime.
    #[error("telemetry client requires a running tokio runtime")]
    NoRuntime,

    /// A process-wide logger has already been installed.
    #[error("a global logger is already installed")]
    AlreadyInstalled,
}
