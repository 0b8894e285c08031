//! Error types for Harpocrates.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Extraction errors
    #[error("The secret '{0}' was not found")]
    SecretNotFound(String),

    #[error("The key '{key}' was not found in the path '{path}'")]
    KeyNotFound { path: String, key: String },

    #[error("Malformed secret specification entry: {0}")]
    MalformedSpecEntry(String),

    #[error("Failed to fetch '{path}': {cause}")]
    FetchTransport { path: String, cause: String },

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid format '{0}', expected one of: json, env, yaml, secret")]
    InvalidFormat(String),

    // Vault errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn key_not_found(path: impl Into<String>, key: impl Into<String>) -> Self {
        Error::KeyNotFound {
            path: path.into(),
            key: key.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
