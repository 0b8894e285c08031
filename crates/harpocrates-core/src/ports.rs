//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the extraction engine and the
//! secret store / filesystem adapters.

use crate::Result;
use crate::resolver::resolve_key;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Read access to a key-value secret store.
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    /// Read every field stored at `path`.
    ///
    /// Fails with `SecretNotFound` when the path does not exist or holds no data.
    async fn fetch_secret(&self, path: &str) -> Result<Map<String, Value>>;

    /// Read a single field, which may be a nested key expression.
    ///
    /// Backends with server-side field selection can override this.
    async fn fetch_secret_field(&self, path: &str, key: &str) -> Result<Value> {
        let secret = self.fetch_secret(path).await?;
        resolve_key(&secret, path, key)
    }

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Write access to the output location.
#[async_trait]
pub trait SecretWriter: Send + Sync {
    /// Write `content` to `file_name` inside the configured output directory.
    ///
    /// `owner` overrides the writer's default owner for this file.
    async fn write(&self, file_name: &str, content: &str, owner: Option<u32>) -> Result<PathBuf>;
}
