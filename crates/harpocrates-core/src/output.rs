//! Result buckets and the output aggregator.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Serialization format for a result bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    #[default]
    Env,
    Yaml,
    /// Raw `KEY=value` lines, as consumed by Kubernetes secret generators.
    Secret,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Env => "env",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Secret => "secret",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "env" => Ok(OutputFormat::Env),
            "yaml" => Ok(OutputFormat::Yaml),
            "secret" => Ok(OutputFormat::Secret),
            other => Err(Error::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved key/value pairs destined for one output.
pub type SecretResult = BTreeMap<String, Value>;

/// Where a bucket came from, which decides how the writer treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketKind {
    /// Shared bucket for bare paths and plain keys.
    Default,
    /// A configured path without keys, written to its own file.
    Dedicated,
    /// A single `saveAsFile` key, written raw to a file named after the key.
    File,
}

/// A named group of resolved secrets plus where and how to write them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBucket {
    pub kind: BucketKind,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<u32>,
    pub result: SecretResult,
}

impl ResultBucket {
    pub fn new(kind: BucketKind, format: OutputFormat) -> Self {
        Self {
            kind,
            format,
            filename: None,
            owner: None,
            result: SecretResult::new(),
        }
    }

    /// A single-key bucket whose filename is the final key name.
    pub fn single_file(key: String, value: Value, format: OutputFormat) -> Self {
        let mut bucket = Self::new(BucketKind::File, format);
        bucket.filename = Some(key.clone());
        bucket.result.insert(key, value);
        bucket
    }

    pub fn with_filename(mut self, filename: Option<String>) -> Self {
        self.filename = filename;
        self
    }

    pub fn with_owner(mut self, owner: Option<u32>) -> Self {
        self.owner = owner;
        self
    }

    /// Insert a value; a later insert under the same key wins.
    pub fn insert(&mut self, key: String, value: Value) {
        self.result.insert(key, value);
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty()
    }

    pub fn len(&self) -> usize {
        self.result.len()
    }
}

/// Collects dedicated and single-key buckets in emission order, followed by
/// the shared default bucket.
#[derive(Debug)]
pub struct OutputAggregator {
    default: ResultBucket,
    buckets: Vec<ResultBucket>,
}

impl OutputAggregator {
    pub fn new(default_format: OutputFormat) -> Self {
        Self {
            default: ResultBucket::new(BucketKind::Default, default_format),
            buckets: Vec::new(),
        }
    }

    pub fn add_default(&mut self, key: String, value: Value) {
        self.default.insert(key, value);
    }

    pub fn push(&mut self, bucket: ResultBucket) {
        self.buckets.push(bucket);
    }

    /// Finish aggregation. The default bucket is always last, even when empty.
    pub fn finish(mut self) -> Vec<ResultBucket> {
        self.buckets.push(self.default);
        self.buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("secret".parse::<OutputFormat>().unwrap(), OutputFormat::Secret);
        assert!(matches!(
            "toml".parse::<OutputFormat>(),
            Err(Error::InvalidFormat(f)) if f == "toml"
        ));
    }

    #[test]
    fn test_aggregator_orders_default_last() {
        let mut aggregator = OutputAggregator::new(OutputFormat::Env);
        aggregator.add_default("A".to_string(), json!("1"));
        aggregator.push(
            ResultBucket::new(BucketKind::Dedicated, OutputFormat::Json)
                .with_filename(Some("db.json".to_string())),
        );
        aggregator.push(ResultBucket::single_file(
            "CERT".to_string(),
            json!("pem"),
            OutputFormat::Env,
        ));

        let buckets = aggregator.finish();
        let kinds: Vec<_> = buckets.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![BucketKind::Dedicated, BucketKind::File, BucketKind::Default]
        );
        assert_eq!(buckets[1].filename.as_deref(), Some("CERT"));
        assert_eq!(buckets[2].result.get("A"), Some(&json!("1")));
    }

    #[test]
    fn test_empty_default_bucket_is_kept() {
        let buckets = OutputAggregator::new(OutputFormat::Yaml).finish();
        assert_eq!(buckets.len(), 1);
        assert!(buckets[0].is_empty());
        assert_eq!(buckets[0].format, OutputFormat::Yaml);
    }

    #[test]
    fn test_last_writer_wins() {
        let mut bucket = ResultBucket::new(BucketKind::Default, OutputFormat::Env);
        bucket.insert("K".to_string(), json!(1));
        bucket.insert("K".to_string(), json!(2));
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.result["K"], json!(2));
    }
}
