//! Filesystem implementation of the secret writer port.

use async_trait::async_trait;
use harpocrates_core::{Result, SecretWriter};
use regex::Regex;
use std::os::unix::fs::chown;
use std::path::PathBuf;
use std::sync::LazyLock;
use tokio::fs::{DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

static INVALID_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]+").expect("valid regex"));

/// Writes rendered buckets below an output directory.
#[derive(Debug, Clone)]
pub struct FilesystemWriter {
    output: PathBuf,
    append: bool,
    owner: Option<u32>,
}

impl FilesystemWriter {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            append: false,
            owner: None,
        }
    }

    pub fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Owner applied to files whose bucket carries none.
    pub fn with_owner(mut self, owner: Option<u32>) -> Self {
        self.owner = owner;
        self
    }

    async fn ensure_dir(&self) -> Result<()> {
        DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.output)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SecretWriter for FilesystemWriter {
    async fn write(&self, file_name: &str, content: &str, owner: Option<u32>) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let path = self.output.join(sanitize_file_name(file_name));
        debug!(path = %path.display(), append = self.append, "Writing secrets file");

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .mode(0o600)
            .open(&path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;

        if let Some(uid) = owner.or(self.owner) {
            chown(&self.output, Some(uid), None)?;
            chown(&path, Some(uid), None)?;
        }

        info!(path = %path.display(), "Secrets written");
        Ok(path)
    }
}

/// Replace every run of characters outside `[a-zA-Z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    INVALID_FILE_CHARS.replace_all(name, "_").into_owned()
}
