//! Vault HTTP client implementing the secret fetcher port.

use crate::error::VaultError;
use async_trait::async_trait;
use harpocrates_core::{Error, Result, SecretFetcher};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Connection settings for a Vault server.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Server address, e.g. `https://vault.example.com`.
    pub address: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl VaultConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    pub(crate) fn http_client(&self) -> std::result::Result<Client, VaultError> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/v1/{}",
            self.address.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Body of a logical read.
#[derive(Debug, Default, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    warnings: Option<Vec<String>>,
}

/// An authenticated Vault client.
pub struct VaultClient {
    config: VaultConfig,
    client: Client,
    token: String,
}

impl VaultClient {
    pub fn new(config: VaultConfig, token: impl Into<String>) -> Result<Self> {
        let client = config
            .http_client()
            .map_err(|e| e.for_path(&config.address))?;
        Ok(Self {
            config,
            client,
            token: token.into(),
        })
    }

    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// Read `path`, returning `None` when Vault has nothing there.
    async fn read(&self, path: &str) -> std::result::Result<Option<ReadResponse>, VaultError> {
        debug!(path = %path, "Reading secret from Vault");
        let response = self
            .client
            .get(self.config.url(path))
            .header("X-Vault-Token", &self.token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.json().await?)),
            // A 404 may still carry warnings, e.g. for a KV v2 path without `data/`.
            StatusCode::NOT_FOUND => Ok(response.json().await.ok()),
            StatusCode::FORBIDDEN => Err(VaultError::PermissionDenied(path.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(VaultError::Status(status.as_u16(), body))
            }
        }
    }

    async fn read_secret(&self, path: &str) -> Result<Map<String, Value>> {
        let mut current = path.to_string();

        loop {
            let response = self
                .read(&current)
                .await
                .map_err(|e| e.for_path(&current))?
                .ok_or_else(|| Error::SecretNotFound(current.clone()))?;

            let data = response.data.unwrap_or_default();
            if !data.is_empty() {
                return unwrap_kv(&current, data);
            }

            let warnings = response.warnings.unwrap_or_default();
            if warnings.is_empty() {
                return Err(Error::SecretNotFound(current));
            }
            match with_data_segment(&current) {
                Some(retry) if retry != current => {
                    debug!(path = %current, retry = %retry, "Retrying as a KV v2 path");
                    current = retry;
                }
                _ => {
                    return Err(Error::FetchTransport {
                        path: current,
                        cause: warnings.join(","),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl SecretFetcher for VaultClient {
    async fn fetch_secret(&self, path: &str) -> Result<Map<String, Value>> {
        self.read_secret(path).await
    }

    fn name(&self) -> &str {
        "vault"
    }
}

// KV v2 nests the fields under `data`; KV v1 returns them directly.
fn unwrap_kv(path: &str, mut data: Map<String, Value>) -> Result<Map<String, Value>> {
    match data.remove("data") {
        Some(Value::Object(fields)) if !fields.is_empty() => Ok(fields),
        Some(Value::Object(_)) | Some(Value::Null) => Err(Error::SecretNotFound(path.to_string())),
        Some(other) => {
            data.insert("data".to_string(), other);
            Ok(data)
        }
        None => Ok(data),
    }
}

/// `secret/app/db` becomes `secret/data/app/db`. Paths that already have
/// `data` as their second segment are returned unchanged.
fn with_data_segment(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if segments.len() < 2 {
        return None;
    }
    if segments[1] != "data" {
        segments.insert(1, "data");
    }
    Some(segments.join("/"))
}
