//! Remote configuration store client.
//!
//! Speaks the key/value REST protocol of the hosted configuration store:
//! partitioned selection by key filter and label, HMAC-SHA256 request
//! signing derived from the connection string, and `@nextLink` paging.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::connection_string::StoreConnectionString;
use crate::config::error::{ConfigError, ConfigResult};

const API_VERSION: &str = "1.0";
const KV_SET_MEDIA_TYPE: &str = "application/vnd.microsoft.appconfig.kvset+json";
const SIGNED_HEADERS: &str = "x-ms-date;host;x-ms-content-sha256";

/// Label value the store uses for "no label".
pub const NULL_LABEL: &str = "\0";

/// Selects keys by filter (`prefix:*` or exact key) within one label partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySelector {
    pub key_filter: String,
    pub label: Option<String>,
}

impl KeySelector {
    pub fn new(key_filter: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key_filter: key_filter.into(),
            label: Some(label.into()),
        }
    }

    /// Selector for keys stored without a label.
    pub fn unlabeled(key_filter: impl Into<String>) -> Self {
        Self {
            key_filter: key_filter.into(),
            label: None,
        }
    }

    /// Evaluate the selector locally, with the store's wildcard semantics.
    pub fn matches(&self, key: &str, label: Option<&str>) -> bool {
        let key_ok = match self.key_filter.strip_suffix('*') {
            Some(prefix) => key.starts_with(prefix),
            None => key == self.key_filter,
        };
        key_ok && self.label.as_deref() == label
    }
}

/// One key/value entry as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigSetting {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// An open connection to a remote configuration store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Every setting matching the selector.
    async fn list(&self, selector: &KeySelector) -> ConfigResult<Vec<ConfigSetting>>;
}

/// Opens store connections from a parsed connection string.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, connection: &StoreConnectionString) -> ConfigResult<Box<dyn ConfigStore>>;
}

/// Connector producing [`AppConfigurationClient`]s.
#[derive(Debug, Clone)]
pub struct HttpStoreConnector {
    timeout: Duration,
}

impl HttpStoreConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl StoreConnector for HttpStoreConnector {
    fn connect(&self, connection: &StoreConnectionString) -> ConfigResult<Box<dyn ConfigStore>> {
        Ok(Box::new(AppConfigurationClient::new(
            connection.clone(),
            self.timeout,
        )?))
    }
}

#[derive(Deserialize)]
struct KvPage {
    #[serde(default)]
    items: Vec<ConfigSetting>,
    #[serde(rename = "@nextLink")]
    next_link: Option<String>,
}

/// HTTP client for the configuration store.
pub struct AppConfigurationClient {
    client: reqwest::Client,
    connection: StoreConnectionString,
}

impl AppConfigurationClient {
    pub fn new(connection: StoreConnectionString, timeout: Duration) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::http(connection.endpoint.as_str(), e))?;
        Ok(Self { client, connection })
    }

    fn first_page_url(&self, selector: &KeySelector) -> ConfigResult<Url> {
        let mut url = self
            .connection
            .endpoint
            .join("kv")
            .map_err(|e| ConfigError::InvalidConnectionString(format!("bad endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("key", &selector.key_filter)
            .append_pair("label", selector.label.as_deref().unwrap_or(NULL_LABEL))
            .append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn fetch_page(&self, url: &Url) -> ConfigResult<KvPage> {
        let signed = sign_request(&self.connection, "GET", url, chrono::Utc::now());
        let response = self
            .client
            .get(url.clone())
            .header("Accept", KV_SET_MEDIA_TYPE)
            .header("x-ms-date", signed.date)
            .header("x-ms-content-sha256", signed.content_hash)
            .header("Authorization", signed.authorization)
            .send()
            .await
            .map_err(|e| ConfigError::http(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ConfigError::http(url.as_str(), e))
    }
}

#[async_trait]
impl ConfigStore for AppConfigurationClient {
    async fn list(&self, selector: &KeySelector) -> ConfigResult<Vec<ConfigSetting>> {
        let mut settings = Vec::new();
        let mut next = Some(self.first_page_url(selector)?);

        while let Some(url) = next.take() {
            let page = self.fetch_page(&url).await?;
            settings.extend(page.items);
            if let Some(link) = page.next_link {
                next = Some(url.join(&link).map_err(|e| {
                    ConfigError::InvalidConnectionString(format!("bad next link '{link}': {e}"))
                })?);
            }
        }

        tracing::debug!(
            key_filter = %selector.key_filter,
            label = selector.label.as_deref().unwrap_or("(none)"),
            count = settings.len(),
            "Fetched remote settings"
        );
        Ok(settings)
    }
}

/// Headers produced by request signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub date: String,
    pub content_hash: String,
    pub authorization: String,
}

/// Sign a body-less request with the connection string's HMAC secret.
pub fn sign_request(
    connection: &StoreConnectionString,
    method: &str,
    url: &Url,
    now: chrono::DateTime<chrono::Utc>,
) -> SignedHeaders {
    let engine = &base64::engine::general_purpose::STANDARD;

    let date = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    let content_hash = engine.encode(Sha256::digest(b""));

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    let string_to_sign = format!("{method}\n{path_and_query}\n{date};{host};{content_hash}");

    // HMAC accepts keys of any length, so construction cannot fail.
    let signature = match Hmac::<Sha256>::new_from_slice(&connection.secret) {
        Ok(mut mac) => {
            mac.update(string_to_sign.as_bytes());
            engine.encode(mac.finalize().into_bytes())
        }
        Err(_) => String::new(),
    };

    SignedHeaders {
        authorization: format!(
            "HMAC-SHA256 Credential={}&SignedHeaders={SIGNED_HEADERS}&Signature={signature}",
            connection.credential_id
        ),
        date,
        content_hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connection(endpoint: &str) -> StoreConnectionString {
        StoreConnectionString::parse(&format!(
            "Endpoint={endpoint};Id=test-id;Secret=c2VjcmV0"
        ))
        .unwrap()
    }

    #[test]
    fn selector_wildcards_and_labels() {
        let common = KeySelector::new("appConfig:*", "Common");
        assert!(common.matches("appConfig:Theme", Some("Common")));
        assert!(!common.matches("appConfig:Theme", Some("Other")));
        assert!(!common.matches("other:Theme", Some("Common")));

        let exact = KeySelector::new("ApplicationInsightsConnectionString", "Common");
        assert!(exact.matches("ApplicationInsightsConnectionString", Some("Common")));
        assert!(!exact.matches("ApplicationInsightsConnectionStringX", Some("Common")));

        assert!(KeySelector::unlabeled("a").matches("a", None));
    }

    #[test]
    fn signing_is_deterministic_and_scoped_to_host() {
        let conn = connection("https://demo.azconfig.io");
        let url = Url::parse("https://demo.azconfig.io/kv?key=a&api-version=1.0").unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let first = sign_request(&conn, "GET", &url, now);
        let second = sign_request(&conn, "GET", &url, now);
        assert_eq!(first, second);
        assert_eq!(first.date, "Fri, 01 Mar 2024 12:00:00 GMT");
        assert_eq!(
            first.content_hash,
            "47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU="
        );
        assert!(first
            .authorization
            .starts_with("HMAC-SHA256 Credential=test-id&SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature="));

        let other_host = Url::parse("https://other.azconfig.io/kv?key=a&api-version=1.0").unwrap();
        assert_ne!(
            sign_request(&conn, "GET", &other_host, now).authorization,
            first.authorization
        );
    }

    #[tokio::test]
    async fn list_follows_next_link_and_signs_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/kv"))
            .and(query_param("key", "appConfig:*"))
            .and(query_param("label", "Common"))
            .and(header_exists("x-ms-date"))
            .and(header_exists("authorization"))
            .and(header("accept", KV_SET_MEDIA_TYPE))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "key": "appConfig:A", "label": "Common", "value": "1" }],
                "@nextLink": "/kv/page2?api-version=1.0"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/kv/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "key": "appConfig:B", "label": "Common", "value": "2",
                            "content_type": "text/plain" }]
            })))
            .mount(&server)
            .await;

        let client =
            AppConfigurationClient::new(connection(&server.uri()), Duration::from_secs(5)).unwrap();
        let settings = client
            .list(&KeySelector::new("appConfig:*", "Common"))
            .await
            .unwrap();

        let keys: Vec<_> = settings.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["appConfig:A", "appConfig:B"]);
        assert_eq!(settings[1].content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn list_reports_status_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client =
            AppConfigurationClient::new(connection(&server.uri()), Duration::from_secs(5)).unwrap();
        let err = client
            .list(&KeySelector::new("appConfig:*", "Common"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::RemoteStatus { status: 401, .. }));
    }
}
