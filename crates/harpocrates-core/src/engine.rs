//! The extraction engine.
//!
//! Walks a list of [`SecretItem`]s in order, fetching each path or key from
//! the injected [`SecretFetcher`] and sorting the values into buckets:
//!
//! - a bare path adds every field to the shared default bucket
//! - a configured path without keys gets a dedicated bucket
//! - configured keys go to the default bucket, or to a single-key file
//!   bucket when `saveAsFile` is set
//!
//! The first error aborts the whole extraction.

use crate::Result;
use crate::context::{ContextSettings, ExtractionContext};
use crate::output::{BucketKind, OutputAggregator, ResultBucket};
use crate::ports::SecretFetcher;
use crate::spec::{KeyItem, PathConfig, SecretItem};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves specification entries into result buckets.
pub struct Extractor {
    fetcher: Arc<dyn SecretFetcher>,
}

impl Extractor {
    pub fn new(fetcher: Arc<dyn SecretFetcher>) -> Self {
        Self { fetcher }
    }

    /// Extract every item. Dedicated and single-key buckets come first in the
    /// order they were produced; the default bucket is always last.
    pub async fn extract(
        &self,
        items: &[SecretItem],
        defaults: ContextSettings,
    ) -> Result<Vec<ResultBucket>> {
        let root = ExtractionContext::new(defaults);
        let mut aggregator = OutputAggregator::new(root.format());

        for item in items {
            match item {
                SecretItem::Path(path) => {
                    self.extract_path(path, &root.reset(), &mut aggregator)
                        .await?;
                }
                SecretItem::Configured { path, config } => {
                    let ctx = root.update(
                        config.prefix.as_deref(),
                        config.upper_case,
                        config.format,
                        true,
                    );
                    if config.keys.is_empty() {
                        self.extract_dedicated(path, config, &ctx, &mut aggregator)
                            .await?;
                    } else {
                        for key in &config.keys {
                            self.extract_key(path, config, key, &ctx, &mut aggregator)
                                .await?;
                        }
                    }
                }
            }
        }

        let buckets = aggregator.finish();
        info!(
            entries = items.len(),
            buckets = buckets.len(),
            fetcher = %self.fetcher.name(),
            "Secrets extracted"
        );
        Ok(buckets)
    }

    async fn extract_path(
        &self,
        path: &str,
        ctx: &ExtractionContext,
        aggregator: &mut OutputAggregator,
    ) -> Result<()> {
        debug!(path = %path, "Extracting whole secret into default bucket");
        let secret = self.fetcher.fetch_secret(path).await?;
        for (key, value) in secret {
            aggregator.add_default(ctx.key_name(&key), value);
        }
        Ok(())
    }

    async fn extract_dedicated(
        &self,
        path: &str,
        config: &PathConfig,
        ctx: &ExtractionContext,
        aggregator: &mut OutputAggregator,
    ) -> Result<()> {
        debug!(
            path = %path,
            format = %ctx.format(),
            "Extracting whole secret into dedicated bucket"
        );
        let secret = self.fetcher.fetch_secret(path).await?;

        let mut bucket = ResultBucket::new(BucketKind::Dedicated, ctx.format())
            .with_filename(config.filename.clone())
            .with_owner(config.owner);
        for (key, value) in secret {
            bucket.insert(ctx.key_name(&key), value);
        }
        aggregator.push(bucket);
        Ok(())
    }

    // `path_ctx` is borrowed, never replaced, so a key's overrides cannot
    // leak into its siblings.
    async fn extract_key(
        &self,
        path: &str,
        config: &PathConfig,
        key: &KeyItem,
        path_ctx: &ExtractionContext,
        aggregator: &mut OutputAggregator,
    ) -> Result<()> {
        match key {
            KeyItem::Name(name) => {
                debug!(path = %path, key = %name, "Extracting key");
                let value = self.fetcher.fetch_secret_field(path, name).await?;
                aggregator.add_default(path_ctx.key_name(name), value);
            }
            KeyItem::Configured {
                name,
                config: key_config,
            } => {
                let key_ctx = path_ctx.update(
                    key_config.prefix.as_deref(),
                    key_config.upper_case,
                    None,
                    false,
                );
                debug!(path = %path, key = %name, "Extracting configured key");
                let value = self.fetcher.fetch_secret_field(path, name).await?;

                let stored = key_ctx.key_name(key_config.override_name.as_deref().unwrap_or(name));
                if key_config.save_as_file == Some(true) {
                    debug!(path = %path, file = %stored, "Routing key to its own file");
                    aggregator.push(
                        ResultBucket::single_file(stored, value, key_ctx.format())
                            .with_owner(config.owner),
                    );
                } else {
                    aggregator.add_default(stored, value);
                }
            }
        }
        Ok(())
    }
}
