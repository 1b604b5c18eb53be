//! Environment mode and connection-string source selection.
//!
//! # Data Flow
//! ```text
//! env `isLocal` (if set) ──┐
//!                          ├─▶ EnvironmentMode ─▶ connection string source
//! `AppSettings:isLocal` ───┘        Local  → local settings file
//!                                   Remote → env `AzureAppConfigurationConnectionString`
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::config::error::{ConfigError, ConfigResult};

/// Environment variable overriding the local `AppSettings:isLocal` flag.
pub const IS_LOCAL_ENV: &str = "isLocal";

/// Environment variable carrying the remote store connection string in Remote mode.
pub const CONNECTION_STRING_ENV: &str = "AzureAppConfigurationConnectionString";

/// Where the process is running, decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentMode {
    /// Developer machine: secrets come from the local settings file.
    Local,
    /// Deployed instance: secrets are injected through the environment.
    Remote,
}

impl EnvironmentMode {
    pub fn is_local(self) -> bool {
        matches!(self, EnvironmentMode::Local)
    }

    /// Map the `isLocal` flag onto a mode.
    pub fn from_is_local(is_local: bool) -> Self {
        if is_local {
            EnvironmentMode::Local
        } else {
            EnvironmentMode::Remote
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentMode::Local => f.write_str("Local"),
            EnvironmentMode::Remote => f.write_str("Remote"),
        }
    }
}

/// Read access to process environment variables.
///
/// Abstracted so resolution can be exercised without touching the real
/// process environment.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of variables, used by tests and tools.
impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<E: EnvSource + ?Sized> EnvSource for &E {
    fn var(&self, key: &str) -> Option<String> {
        (**self).var(key)
    }
}

/// Parse a boolean the way the configuration files write them:
/// `true` / `false`, case-insensitive, surrounding whitespace ignored.
pub fn parse_bool(raw: &str, source_name: &str) -> ConfigResult<bool> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::InvalidBoolean {
            source_name: source_name.to_string(),
            value: raw.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_any_case() {
        for raw in ["true", "True", "TRUE", " true "] {
            assert!(parse_bool(raw, "test").unwrap(), "{raw}");
        }
        for raw in ["false", "False", "FALSE", "false\n"] {
            assert!(!parse_bool(raw, "test").unwrap(), "{raw}");
        }
    }

    #[test]
    fn parse_bool_rejects_non_booleans() {
        for raw in ["1", "0", "yes", "no", "", "truthy"] {
            let err = parse_bool(raw, "env 'isLocal'").unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBoolean { .. }), "{raw}");
        }
    }

    #[test]
    fn mode_display_and_mapping() {
        assert_eq!(EnvironmentMode::from_is_local(true), EnvironmentMode::Local);
        assert_eq!(EnvironmentMode::from_is_local(false), EnvironmentMode::Remote);
        assert_eq!(EnvironmentMode::Local.to_string(), "Local");
        assert_eq!(EnvironmentMode::Remote.to_string(), "Remote");
    }
}
