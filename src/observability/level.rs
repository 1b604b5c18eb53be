//! Level names as written in configuration.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;

use crate::observability::error::LoggingError;

/// Parse a level name.
///
/// Accepts the configuration-file names (`Verbose`, `Debug`, `Information`,
/// `Warning`, `Error`, `Fatal`) and the tracing names (`trace`, `info`,
/// `warn`, …), case-insensitively. `Fatal` maps onto `ERROR`.
pub fn parse_level(raw: &str) -> Result<LevelFilter, LoggingError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "verbose" | "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "information" | "info" => Ok(LevelFilter::INFO),
        "warning" | "warn" => Ok(LevelFilter::WARN),
        "error" | "fatal" => Ok(LevelFilter::ERROR),
        "off" | "none" => Ok(LevelFilter::OFF),
        _ => Err(LoggingError::InvalidLevel(raw.to_string())),
    }
}

/// Directive spelling understood by `EnvFilter`.
pub fn directive_name(level: LevelFilter) -> &'static str {
    match level.into_level() {
        Some(Level::TRACE) => "trace",
        Some(Level::DEBUG) => "debug",
        Some(Level::INFO) => "info",
        Some(Level::WARN) => "warn",
        Some(_) => "error",
        None => "off",
    }
}

/// Three-letter upper-case abbreviation used by the file sink.
pub fn abbreviation(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "VRB",
        Level::DEBUG => "DBG",
        Level::INFO => "INF",
        Level::WARN => "WRN",
        _ => "ERR",
    }
}

/// Telemetry severity (0 = verbose … 3 = error).
pub fn severity(level: &Level) -> u8 {
    match *level {
        Level::TRACE | Level::DEBUG => 0,
        Level::INFO => 1,
        Level::WARN => 2,
        _ => 3,
    }
}
