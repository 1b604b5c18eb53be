//! Secret-store reference resolution.
//!
//! # Responsibilities
//! - Recognise settings that point at a secret held in a vault
//! - Obtain a bearer token from the ambient credential chain
//! - Fetch the secret value and hand it back to the remote resolver
//!
//! # Design Decisions
//! - The credential is only consulted when a reference is present
//! - Tokens are fetched per resolution; bootstrap resolves a handful at most
//! - Every HTTP call carries the configured timeout; no retries

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::environment::EnvSource;
use crate::config::error::{ConfigError, ConfigResult};

/// Content type marking a setting whose value is a secret reference.
pub const SECRET_REFERENCE_CONTENT_TYPE: &str =
    "application/vnd.microsoft.appconfig.keyvaultref+json";

/// OAuth scope for the vault data plane.
pub const VAULT_SCOPE: &str = "https://vault.azure.net/.default";

const VAULT_API_VERSION: &str = "7.4";

/// Pointer to a secret held in a separate vault.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretReference {
    pub uri: String,
}

impl SecretReference {
    /// Parse the JSON body of a reference setting (`{"uri": "…"}`).
    pub fn from_setting(key: &str, value: &str) -> ConfigResult<Self> {
        serde_json::from_str(value).map_err(|e| ConfigError::Secret {
            key: key.to_string(),
            reason: format!("malformed reference: {e}"),
        })
    }
}

/// Whether a content type denotes a secret reference.
pub fn is_secret_reference(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with(SECRET_REFERENCE_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Source of bearer tokens for the secret store.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self, scope: &str) -> ConfigResult<String>;
}

/// Resolves secret references to their plain values.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, key: &str, reference: &SecretReference) -> ConfigResult<String>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Service principal credential (`AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`).
#[derive(Clone)]
pub struct ClientSecretCredential {
    client: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub const DEFAULT_AUTHORITY: &'static str = "https://login.microsoftonline.com";

    pub fn from_env(env: &dyn EnvSource, client: reqwest::Client) -> Option<Self> {
        let get = |k: &str| env.var(k).filter(|v| !v.is_empty());
        Some(Self {
            client,
            authority: get("AZURE_AUTHORITY_HOST")
                .unwrap_or_else(|| Self::DEFAULT_AUTHORITY.to_string()),
            tenant_id: get("AZURE_TENANT_ID")?,
            client_id: get("AZURE_CLIENT_ID")?,
            client_secret: get("AZURE_CLIENT_SECRET")?,
        })
    }
}

#[async_trait]
impl CredentialProvider for ClientSecretCredential {
    async fn access_token(&self, scope: &str) -> ConfigResult<String> {
        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope),
            ])
            .send()
            .await
            .map_err(|e| ConfigError::http(&url, e))?;
        read_token(&url, response).await
    }
}

/// Managed identity as exposed to hosted apps (`IDENTITY_ENDPOINT`, `IDENTITY_HEADER`).
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    endpoint: String,
    header: String,
}

impl ManagedIdentityCredential {
    pub fn from_env(env: &dyn EnvSource, client: reqwest::Client) -> Option<Self> {
        Some(Self {
            client,
            endpoint: env.var("IDENTITY_ENDPOINT").filter(|v| !v.is_empty())?,
            header: env.var("IDENTITY_HEADER").filter(|v| !v.is_empty())?,
        })
    }
}

#[async_trait]
impl CredentialProvider for ManagedIdentityCredential {
    async fn access_token(&self, scope: &str) -> ConfigResult<String> {
        let resource = scope.trim_end_matches("/.default");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("api-version", "2019-08-01"), ("resource", resource)])
            .header("X-IDENTITY-HEADER", &self.header)
            .send()
            .await
            .map_err(|e| ConfigError::http(&self.endpoint, e))?;
        read_token(&self.endpoint, response).await
    }
}

async fn read_token(url: &str, response: reqwest::Response) -> ConfigResult<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(ConfigError::RemoteStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| ConfigError::http(url, e))?;
    Ok(token.access_token)
}

/// Ambient credential chain: service principal first, then managed identity.
pub struct DefaultCredential {
    chain: Vec<Box<dyn CredentialProvider>>,
}

impl DefaultCredential {
    pub fn from_env(env: &dyn EnvSource, timeout: Duration) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Credential(format!("failed to build HTTP client: {e}")))?;

        let mut chain: Vec<Box<dyn CredentialProvider>> = Vec::new();
        if let Some(cred) = ClientSecretCredential::from_env(env, client.clone()) {
            chain.push(Box::new(cred));
        }
        if let Some(cred) = ManagedIdentityCredential::from_env(env, client) {
            chain.push(Box::new(cred));
        }
        Ok(Self { chain })
    }
}

#[async_trait]
impl CredentialProvider for DefaultCredential {
    async fn access_token(&self, scope: &str) -> ConfigResult<String> {
        let mut failures = Vec::new();
        for provider in &self.chain {
            match provider.access_token(scope).await {
                Ok(token) => return Ok(token),
                Err(e) => {
                    tracing::debug!(error = %e, "Credential source failed, trying next");
                    failures.push(e.to_string());
                }
            }
        }
        if failures.is_empty() {
            Err(ConfigError::Credential(
                "no client secret or managed identity configured".to_string(),
            ))
        } else {
            Err(ConfigError::Credential(failures.join("; ")))
        }
    }
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// Vault data-plane client.
pub struct VaultSecretResolver<C> {
    client: reqwest::Client,
    credential: C,
}

impl<C: CredentialProvider> VaultSecretResolver<C> {
    pub fn new(credential: C, timeout: Duration) -> ConfigResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Credential(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, credential })
    }
}

#[async_trait]
impl<C: CredentialProvider> SecretResolver for VaultSecretResolver<C> {
    async fn resolve(&self, key: &str, reference: &SecretReference) -> ConfigResult<String> {
        let token = self.credential.access_token(VAULT_SCOPE).await?;
        let response = self
            .client
            .get(&reference.uri)
            .query(&[("api-version", VAULT_API_VERSION)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ConfigError::http(&reference.uri, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::Secret {
                key: key.to_string(),
                reason: format!("vault returned HTTP {}", status.as_u16()),
            });
        }
        let bundle: SecretBundle = response.json().await.map_err(|e| ConfigError::Secret {
            key: key.to_string(),
            reason: format!("unreadable secret bundle: {e}"),
        })?;
        Ok(bundle.value)
    }
}
