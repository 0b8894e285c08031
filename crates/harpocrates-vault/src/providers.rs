//! In-memory secret fetcher.

use async_trait::async_trait;
use harpocrates_core::{Error, Result, SecretFetcher};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Serves secrets from a map of path to fields. Useful for tests and for
/// dry runs against a JSON snapshot of a Vault mount.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    secrets: HashMap<String, Map<String, Value>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the secret at `path`.
    pub fn insert(&mut self, path: impl Into<String>, fields: Map<String, Value>) {
        self.secrets.insert(path.into(), fields);
    }

    /// Load a JSON object of `{"<path>": {<fields>}}`.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let secrets: HashMap<String, Map<String, Value>> = serde_json::from_str(&content)?;
        debug!(file = %path.display(), secrets = secrets.len(), "Loaded static secrets");
        Ok(Self { secrets })
    }
}

#[async_trait]
impl SecretFetcher for StaticFetcher {
    async fn fetch_secret(&self, path: &str) -> Result<Map<String, Value>> {
        self.secrets
            .get(path)
            .filter(|fields| !fields.is_empty())
            .cloned()
            .ok_or_else(|| Error::SecretNotFound(path.to_string()))
    }

    fn name(&self) -> &str {
        "static"
    }
}
