//! Well-known configuration keys and startup options.
//!
//! Keys are colon-segmented paths into the merged
//! [`ConfigurationNamespace`](crate::config::ConfigurationNamespace).

use std::net::SocketAddr;
use std::time::Duration;

use crate::config::namespace::ConfigurationNamespace;
use crate::config::remote::KeySelector;

/// Application name used for enrichment and the app-specific partition.
pub const APPLICATION_NAME: &str = "weather-telemetry";

/// Label (and key prefix) of the app-specific remote partition.
pub const APPLICATION_PARTITION: &str = "WeatherTelemetry";

/// Label of the partition shared by every service.
pub const COMMON_PARTITION: &str = "Common";

pub mod keys {
    /// Local-file flag selecting Local mode.
    pub const IS_LOCAL_SETTING: &str = "AppSettings:isLocal";

    /// Local-file connection string to the remote store (Local mode only).
    pub const LOCAL_CONNECTION_STRING: &str = "AppSettings:AzureAppConfigurationConnectionString";

    /// Timeout in seconds for remote store, vault and identity calls.
    pub const REMOTE_TIMEOUT_SECS: &str = "AppSettings:RemoteTimeoutSecs";

    /// Credential for the telemetry sink. Required.
    pub const TELEMETRY_CONNECTION_STRING: &str = "ApplicationInsightsConnectionString";

    /// Resolved mode published back for request handlers (`true`/`false`).
    pub const IS_LOCAL: &str = "IsLocal";

    /// Listen address.
    pub const URLS: &str = "Urls";

    pub const MINIMUM_LEVEL: &str = "Serilog:MinimumLevel";
    pub const MINIMUM_LEVEL_DEFAULT: &str = "Serilog:MinimumLevel:Default";
    pub const MINIMUM_LEVEL_OVERRIDE: &str = "Serilog:MinimumLevel:Override";
    pub const ENRICHMENT_PROPERTIES: &str = "Serilog:Properties";
}

pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Partitions fetched from the remote store, in merge order.
pub fn default_selectors() -> Vec<KeySelector> {
    vec![
        KeySelector::new("appConfig:*", COMMON_PARTITION),
        KeySelector::new("ConnectionString:*", COMMON_PARTITION),
        KeySelector::new(keys::TELEMETRY_CONNECTION_STRING, COMMON_PARTITION),
        KeySelector::new(format!("{APPLICATION_PARTITION}:*"), APPLICATION_PARTITION),
    ]
}

/// Build/deploy-time switches, fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupOptions {
    /// Add the rolling file sink.
    pub file_sink: bool,
    /// Print the merged namespace once it is assembled.
    pub print_config: bool,
    /// Remote call timeout used until the namespace supplies one.
    pub remote_timeout: Duration,
}

impl StartupOptions {
    /// Options as selected by the crate's Cargo features.
    pub fn from_build() -> Self {
        Self {
            file_sink: cfg!(feature = "file-sink"),
            print_config: cfg!(feature = "print-config"),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        }
    }

    /// Apply the local-file timeout override, ignoring unparsable values.
    pub fn with_local_settings(mut self, local: &ConfigurationNamespace) -> Self {
        if let Some(raw) = local.get_non_empty(keys::REMOTE_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.remote_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %raw, "Ignoring invalid remote timeout"),
            }
        }
        self
    }
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self::from_build()
    }
}

/// Listen address: `Urls` from the namespace, else the default.
pub fn bind_address(namespace: &ConfigurationNamespace) -> Result<SocketAddr, std::net::AddrParseError> {
    namespace
        .get_non_empty(keys::URLS)
        .unwrap_or(DEFAULT_BIND_ADDRESS)
        .trim()
        .parse()
}
