//! Environment-aware resolution of the remote configuration store.
//!
//! # Responsibilities
//! - Decide the [`EnvironmentMode`] once from env or local settings
//! - Pick the connection string source for that mode
//! - Fetch partitioned settings, resolve secret references and merge
//!   them over the local defaults
//!
//! # Design Decisions
//! - Each source is consulted only in the mode that owns it
//! - An empty connection string fails before any connection is opened
//! - Transport failures propagate unchanged: first failure is fatal

use crate::config::connection_string::StoreConnectionString;
use crate::config::environment::{
    parse_bool, EnvSource, EnvironmentMode, CONNECTION_STRING_ENV, IS_LOCAL_ENV,
};
use crate::config::error::{ConfigError, ConfigResult};
use crate::config::namespace::ConfigurationNamespace;
use crate::config::remote::{KeySelector, StoreConnector};
use crate::config::schema::keys;
use crate::config::secrets::{is_secret_reference, SecretReference, SecretResolver};

/// Resolves where configuration comes from and loads it.
pub struct RemoteConfigResolver<E> {
    env: E,
    local: ConfigurationNamespace,
}

impl<E: EnvSource> RemoteConfigResolver<E> {
    /// `local` holds the file-based defaults (lowest merge precedence).
    pub fn new(env: E, local: ConfigurationNamespace) -> Self {
        Self { env, local }
    }

    pub fn local_settings(&self) -> &ConfigurationNamespace {
        &self.local
    }

    /// Env `isLocal` wins when present and non-empty; otherwise
    /// `AppSettings:isLocal` from the local file, defaulting to Remote.
    pub fn resolve_environment_mode(&self) -> ConfigResult<EnvironmentMode> {
        if let Some(raw) = self.env.var(IS_LOCAL_ENV).filter(|v| !v.is_empty()) {
            let is_local = parse_bool(&raw, &format!("environment variable '{IS_LOCAL_ENV}'"))?;
            tracing::info!(is_local, "Using isLocal setting from environment variables");
            return Ok(EnvironmentMode::from_is_local(is_local));
        }

        let is_local = self.local.get_bool(keys::IS_LOCAL_SETTING)?.unwrap_or(false);
        tracing::info!(is_local, "Using isLocal setting from local settings file");
        Ok(EnvironmentMode::from_is_local(is_local))
    }

    /// Connection string for `mode`; empty when the owning source has none.
    pub fn resolve_connection_string(&self, mode: EnvironmentMode) -> String {
        match mode {
            EnvironmentMode::Local => self
                .local
                .get(keys::LOCAL_CONNECTION_STRING)
                .unwrap_or_default()
                .to_string(),
            EnvironmentMode::Remote => self.env.var(CONNECTION_STRING_ENV).unwrap_or_default(),
        }
    }

    /// Fetch every selected partition and merge it over the local defaults.
    pub async fn connect_remote_store(
        &self,
        connection_string: &str,
        selectors: &[KeySelector],
        connector: &dyn StoreConnector,
        secrets: &dyn SecretResolver,
    ) -> ConfigResult<ConfigurationNamespace> {
        let remote = connect_remote_store(connection_string, selectors, connector, secrets).await?;
        let mut merged = self.local.clone();
        merged.merge(remote);
        Ok(merged)
    }
}

/// Fetch the selected partitions from the remote store.
///
/// Later selectors override earlier ones; resolved secrets replace their
/// reference entries under the same key.
pub async fn connect_remote_store(
    connection_string: &str,
    selectors: &[KeySelector],
    connector: &dyn StoreConnector,
    secrets: &dyn SecretResolver,
) -> ConfigResult<ConfigurationNamespace> {
    if connection_string.trim().is_empty() {
        return Err(ConfigError::ConfigurationUnavailable(
            "connection string is empty".to_string(),
        ));
    }

    let connection = StoreConnectionString::parse(connection_string)?;
    tracing::debug!(endpoint = %connection.endpoint, "Connecting to remote configuration store");
    let store = connector.connect(&connection)?;

    let mut namespace = ConfigurationNamespace::new();
    let mut secret_count = 0usize;
    for selector in selectors {
        for setting in store.list(selector).await? {
            let value = setting.value.unwrap_or_default();
            let value = if is_secret_reference(setting.content_type.as_deref()) {
                let reference = SecretReference::from_setting(&setting.key, &value)?;
                secret_count += 1;
                secrets.resolve(&setting.key, &reference).await?
            } else {
                value
            };
            namespace.insert(setting.key, value);
        }
    }

    tracing::info!(
        keys = namespace.len(),
        secrets = secret_count,
        "Remote configuration loaded"
    );
    Ok(namespace)
}
