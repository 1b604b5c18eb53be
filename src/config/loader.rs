//! Local settings loading from disk.

use std::fs;
use std::path::Path;

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::namespace::ConfigurationNamespace;

/// Base settings file name in the content root.
pub const SETTINGS_FILE: &str = "appsettings.toml";

/// Environment variable naming the optional overlay file.
pub const ENVIRONMENT_NAME_ENV: &str = "APP_ENVIRONMENT";

/// Load `appsettings.toml`, overlaid by `appsettings.<environment>.toml`.
///
/// Missing files are treated as empty layers; unreadable or malformed
/// files are errors.
pub fn load_local_settings(
    content_root: &Path,
    environment: Option<&str>,
) -> ConfigResult<ConfigurationNamespace> {
    let mut namespace = load_optional(&content_root.join(SETTINGS_FILE))?;

    if let Some(name) = environment.map(str::trim).filter(|n| !n.is_empty()) {
        let overlay = content_root.join(format!("appsettings.{name}.toml"));
        namespace.merge(load_optional(&overlay)?);
    }

    Ok(namespace)
}

fn load_optional(path: &Path) -> ConfigResult<ConfigurationNamespace> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Settings file not found, skipping");
            return Ok(ConfigurationNamespace::new());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    ConfigurationNamespace::from_toml_str(&content).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
