//! `Key=Value;Key=Value` connection string parsing.

use std::collections::HashMap;

use base64::Engine;
use url::Url;

use crate::config::error::{ConfigError, ConfigResult};

/// Split a connection string into its segments.
///
/// Segment names are matched case-insensitively (stored lowercased). Values
/// may themselves contain `=` (base64 padding), so only the first `=` splits.
pub fn parse_segments(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter_map(|segment| {
            let segment = segment.trim();
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect()
}

/// Parsed connection string for the remote configuration store.
#[derive(Clone)]
pub struct StoreConnectionString {
    pub endpoint: Url,
    pub credential_id: String,
    pub secret: Vec<u8>,
}

impl std::fmt::Debug for StoreConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("credential_id", &self.credential_id)
            .field("secret", &"****")
            .finish()
    }
}

impl StoreConnectionString {
    /// Parse `Endpoint=https://…;Id=…;Secret=<base64>`.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let segments = parse_segments(raw);
        let field = |name: &str| {
            segments
                .get(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::InvalidConnectionString(format!("missing '{name}'")))
        };

        let endpoint = Url::parse(field("endpoint")?).map_err(|e| {
            ConfigError::InvalidConnectionString(format!("bad endpoint: {e}"))
        })?;
        let credential_id = field("id")?.clone();
        let secret = base64::engine::general_purpose::STANDARD
            .decode(field("secret")?)
            .map_err(|e| ConfigError::InvalidConnectionString(format!("bad secret: {e}")))?;

        Ok(Self {
            endpoint,
            credential_id,
            secret,
        })
    }
}
