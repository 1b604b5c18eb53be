//! Flat, colon-segmented configuration namespace.
//!
//! Every configuration source (local TOML file, remote store, secret
//! store) is reduced to `key → string` pairs where nested sections are
//! joined with `:` (`AppSettings:isLocal`). Sources are merged in order;
//! the last writer wins. Keys are case-sensitive.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::config::environment::parse_bool;
use crate::config::error::ConfigResult;

/// Separator between key segments.
pub const KEY_DELIMITER: &str = ":";

/// Merged configuration, read-only once bootstrap has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationNamespace {
    entries: BTreeMap<String, String>,
}

impl ConfigurationNamespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten a TOML document into a namespace.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let mut namespace = Self::new();
        for (key, value) in &table {
            namespace.flatten_value(key.clone(), value);
        }
        Ok(namespace)
    }

    fn flatten_value(&mut self, prefix: String, value: &toml::Value) {
        match value {
            toml::Value::Table(table) => {
                for (key, nested) in table {
                    self.flatten_value(format!("{prefix}{KEY_DELIMITER}{key}"), nested);
                }
            }
            toml::Value::Array(items) => {
                for (index, nested) in items.iter().enumerate() {
                    self.flatten_value(format!("{prefix}{KEY_DELIMITER}{index}"), nested);
                }
            }
            toml::Value::String(s) => {
                self.entries.insert(prefix, s.clone());
            }
            other => {
                self.entries.insert(prefix, other.to_string());
            }
        }
    }

    /// Raw lookup; an empty string is returned as-is.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Lookup that treats an empty (or whitespace-only) value as unset.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    /// Boolean lookup. Unset keys yield `Ok(None)`; malformed values are an error.
    pub fn get_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        match self.get_non_empty(key) {
            Some(raw) => parse_bool(raw, &format!("setting '{key}'")).map(Some),
            None => Ok(None),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Overlay `other` on top of `self`; keys present in `other` win.
    pub fn merge(&mut self, other: ConfigurationNamespace) {
        self.entries.extend(other.entries);
    }

    /// Direct children of `section`, keyed by the remaining key suffix.
    pub fn section(&self, section: &str) -> impl Iterator<Item = (&str, &str)> {
        let prefix = format!("{section}{KEY_DELIMITER}");
        self.entries.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix.as_str())
                .map(|rest| (rest, v.as_str()))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries with a non-empty value, in key order.
    pub fn non_empty_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, v)| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Human-readable listing of every non-empty entry.
    ///
    /// When `mask_secrets` is set, values of keys that look like credentials
    /// are replaced with `****`.
    pub fn render_dump(&self, mask_secrets: bool) -> String {
        let mut out = String::from("Print all configuration values\n");
        for (index, (key, value)) in self.non_empty_entries().enumerate() {
            let shown = if mask_secrets && is_sensitive_key(key) {
                "****"
            } else {
                value
            };
            let _ = writeln!(out, "{index} --> {key}: {shown}");
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigurationNamespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    ["secret", "password", "connectionstring"]
        .iter()
        .any(|marker| lower.contains(marker))
}
