//! Vault authentication.
//!
//! A token given up front is used as is. Otherwise a JWT is exchanged for a
//! Vault token: either the one at `token_path` (the Kubernetes service account
//! token by default) through `auth/<auth_name>/login`, or a GCP workload
//! identity token from the metadata server through `auth/gcp/login`.

use crate::client::{VaultClient, VaultConfig};
use crate::error::VaultError;
use harpocrates_core::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default location of the Kubernetes service account token.
pub const DEFAULT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// GCE metadata server, reachable from GKE workloads.
pub const DEFAULT_GCP_METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

const GCP_AUTH_MOUNT: &str = "gcp";

/// How to obtain a Vault token.
#[derive(Debug, Clone)]
pub enum VaultAuth {
    /// A ready-made token.
    Token(String),
    /// Exchange a JWT for a token using a JWT/Kubernetes auth mount.
    Jwt {
        auth_name: String,
        role_name: String,
        token_path: PathBuf,
    },
    /// Exchange a GCP workload identity token for a token on the `gcp` mount.
    Gcp { role: String, metadata_url: String },
}

#[derive(Debug, Serialize)]
struct JwtLoginRequest<'a> {
    jwt: &'a str,
    role: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    auth: Option<LoginAuth>,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LoginAuth {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

impl VaultAuth {
    /// GCP workload identity login against the default metadata server.
    pub fn gcp(role: impl Into<String>) -> Self {
        VaultAuth::Gcp {
            role: role.into(),
            metadata_url: DEFAULT_GCP_METADATA_URL.to_string(),
        }
    }

    /// Obtain a token and build an authenticated client.
    pub async fn connect(&self, config: VaultConfig) -> Result<VaultClient> {
        let token = match self {
            VaultAuth::Token(token) => {
                debug!("Using provided Vault token");
                token.clone()
            }
            VaultAuth::Jwt {
                auth_name,
                role_name,
                token_path,
            } => {
                let jwt = read_token_file(token_path).await.map_err(VaultError::for_login)?;
                login(&config, auth_name, role_name, &jwt)
                    .await
                    .map_err(VaultError::for_login)?
            }
            VaultAuth::Gcp { role, metadata_url } => {
                let jwt = gcp_identity_token(&config, metadata_url, role)
                    .await
                    .map_err(VaultError::for_login)?;
                login(&config, GCP_AUTH_MOUNT, role, &jwt)
                    .await
                    .map_err(VaultError::for_login)?
            }
        };
        VaultClient::new(config, token)
    }
}

async fn read_token_file(token_path: &Path) -> std::result::Result<String, VaultError> {
    tokio::fs::read_to_string(token_path)
        .await
        .map_err(|source| VaultError::TokenFile {
            path: token_path.display().to_string(),
            source,
        })
}

/// Fetch an identity token for `http://vault/<role>` from the metadata server.
async fn gcp_identity_token(
    config: &VaultConfig,
    metadata_url: &str,
    role: &str,
) -> std::result::Result<String, VaultError> {
    let url = format!(
        "{}/instance/service-accounts/default/identity",
        metadata_url.trim_end_matches('/')
    );
    let audience = format!("http://vault/{}", role);
    debug!(role = %role, "Fetching GCP workload identity token");

    let response = config
        .http_client()?
        .get(url)
        .header("Metadata-Flavor", "Google")
        .query(&[("audience", audience.as_str()), ("format", "full")])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(VaultError::Login(format!(
            "GCP metadata server returned {}: {}",
            status, body
        )));
    }
    Ok(response.text().await?)
}

async fn login(
    config: &VaultConfig,
    auth_name: &str,
    role_name: &str,
    jwt: &str,
) -> std::result::Result<String, VaultError> {
    let url = config.url(&format!("auth/{}/login", auth_name));
    debug!(auth = %auth_name, role = %role_name, "Logging in to Vault");

    let response = config
        .http_client()?
        .post(url)
        .json(&JwtLoginRequest {
            jwt: jwt.trim(),
            role: role_name,
        })
        .send()
        .await?;

    let status = response.status();
    let body: LoginResponse = response.json().await.map_err(|e| {
        VaultError::Login(format!("unexpected response from Vault ({}): {}", status, e))
    })?;

    if !body.errors.is_empty() {
        return Err(VaultError::Login(body.errors.join(", ")));
    }

    let auth = body
        .auth
        .ok_or_else(|| VaultError::Login("response did not contain a token".to_string()))?;
    info!(auth = %auth_name, lease_seconds = auth.lease_duration, "Logged in to Vault");
    Ok(auth.client_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harpocrates_core::{Error, SecretFetcher};
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_jwt_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/kubernetes/login"))
            .and(body_json(json!({ "jwt": "service-account-jwt", "role": "app" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": { "client_token": "s.issued", "lease_duration": 3600 }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/app"))
            .and(header("X-Vault-Token", "s.issued"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "data": { "key": "value" } }
            })))
            .mount(&server)
            .await;

        let jwt = token_file("service-account-jwt\n");
        let auth = VaultAuth::Jwt {
            auth_name: "kubernetes".to_string(),
            role_name: "app".to_string(),
            token_path: jwt.path().to_path_buf(),
        };

        let client = auth.connect(VaultConfig::new(server.uri())).await.unwrap();
        let secret = client.fetch_secret("secret/data/app").await.unwrap();
        assert_eq!(secret["key"], json!("value"));
    }

    #[tokio::test]
    async fn test_login_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "errors": ["invalid role name \"nope\""]
            })))
            .mount(&server)
            .await;

        let jwt = token_file("jwt");
        let auth = VaultAuth::Jwt {
            auth_name: "kubernetes".to_string(),
            role_name: "nope".to_string(),
            token_path: jwt.path().to_path_buf(),
        };

        let err = auth.connect(VaultConfig::new(server.uri())).await.err().unwrap();
        assert!(matches!(err, Error::Authentication(msg) if msg.contains("invalid role name")));
    }

    #[tokio::test]
    async fn test_missing_token_file() {
        let auth = VaultAuth::Jwt {
            auth_name: "kubernetes".to_string(),
            role_name: "app".to_string(),
            token_path: PathBuf::from("/nonexistent/token"),
        };

        let err = auth.connect(VaultConfig::default()).await.err().unwrap();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[tokio::test]
    async fn test_unreachable_vault_is_an_authentication_error() {
        let jwt = token_file("jwt");
        let auth = VaultAuth::Jwt {
            auth_name: "kubernetes".to_string(),
            role_name: "app".to_string(),
            token_path: jwt.path().to_path_buf(),
        };

        let err = auth
            .connect(VaultConfig::new("http://127.0.0.1:1"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Authentication(msg) if msg.contains("HTTP request failed")));
    }

    #[tokio::test]
    async fn test_gcp_workload_identity_login() {
        let metadata = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/computeMetadata/v1/instance/service-accounts/default/identity"))
            .and(header("Metadata-Flavor", "Google"))
            .and(query_param("audience", "http://vault/app"))
            .and(query_param("format", "full"))
            .respond_with(ResponseTemplate::new(200).set_body_string("gcp-identity-jwt"))
            .mount(&metadata)
            .await;

        let vault = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/auth/gcp/login"))
            .and(body_json(json!({ "jwt": "gcp-identity-jwt", "role": "app" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": { "client_token": "s.gcp", "lease_duration": 600 }
            })))
            .mount(&vault)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/secret/data/app"))
            .and(header("X-Vault-Token", "s.gcp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "data": { "key": "value" } }
            })))
            .mount(&vault)
            .await;

        let auth = VaultAuth::Gcp {
            role: "app".to_string(),
            metadata_url: format!("{}/computeMetadata/v1", metadata.uri()),
        };
        let client = auth.connect(VaultConfig::new(vault.uri())).await.unwrap();
        let secret = client.fetch_secret("secret/data/app").await.unwrap();
        assert_eq!(secret["key"], json!("value"));
    }

    #[tokio::test]
    async fn test_gcp_metadata_failure() {
        let metadata = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not on GCE"))
            .mount(&metadata)
            .await;

        let auth = VaultAuth::Gcp {
            role: "app".to_string(),
            metadata_url: metadata.uri(),
        };
        let err = auth.connect(VaultConfig::default()).await.err().unwrap();
        assert!(matches!(err, Error::Authentication(msg) if msg.contains("not on GCE")));
    }

    #[test]
    fn test_gcp_uses_default_metadata_server() {
        match VaultAuth::gcp("app") {
            VaultAuth::Gcp { role, metadata_url } => {
                assert_eq!(role, "app");
                assert_eq!(metadata_url, DEFAULT_GCP_METADATA_URL);
            }
            other => panic!("unexpected auth: {:?}", other),
        }
    }
}
