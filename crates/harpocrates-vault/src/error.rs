//! Vault adapter errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Vault returned status {0}: {1}")]
    Status(u16, String),
    #[error("Permission denied for '{0}'")]
    PermissionDenied(String),
    #[error("Login failed: {0}")]
    Login(String),
    #[error("Unable to read token file '{path}': {source}")]
    TokenFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl VaultError {
    /// Attach the secret path that was being read.
    pub fn for_path(self, path: &str) -> harpocrates_core::Error {
        harpocrates_core::Error::FetchTransport {
            path: path.to_string(),
            cause: self.to_string(),
        }
    }

    /// Any failure while obtaining a token is an authentication failure.
    pub fn for_login(self) -> harpocrates_core::Error {
        match self {
            VaultError::Login(msg) => harpocrates_core::Error::Authentication(msg),
            other => harpocrates_core::Error::Authentication(other.to_string()),
        }
    }
}
