//! Rendering result buckets into file contents.

use crate::Result;
use crate::output::{BucketKind, OutputFormat, ResultBucket, SecretResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static INVALID_ENV_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]+").expect("valid regex"));

/// Render a bucket in its format. Single-key file buckets hold the bare value.
pub fn render(bucket: &ResultBucket) -> Result<String> {
    if bucket.kind == BucketKind::File {
        return Ok(bucket.result.values().map(raw_value).collect());
    }

    match bucket.format {
        OutputFormat::Json => to_json(&bucket.result),
        OutputFormat::Yaml => to_yaml(&bucket.result),
        OutputFormat::Env => Ok(to_env(&bucket.result)),
        OutputFormat::Secret => Ok(to_secret(&bucket.result)),
    }
}

pub fn to_json(result: &SecretResult) -> Result<String> {
    debug!("Exporting as JSON");
    Ok(serde_json::to_string(result)?)
}

pub fn to_yaml(result: &SecretResult) -> Result<String> {
    debug!("Exporting as YAML");
    Ok(serde_yaml::to_string(result)?)
}

/// `export KEY='value'` lines, with keys made safe for a shell.
pub fn to_env(result: &SecretResult) -> String {
    debug!("Exporting as env values");
    result
        .iter()
        .map(|(key, value)| format!("export {}={}\n", env_name(key), quoted_value(value)))
        .collect()
}

/// `KEY=value` lines with keys left as they are.
pub fn to_secret(result: &SecretResult) -> String {
    debug!("Exporting as raw key values");
    result
        .iter()
        .map(|(key, value)| format!("{}={}\n", key, quoted_value(value)))
        .collect()
}

/// `KEY=value` pairs for a child process environment.
pub fn env_pairs(result: &SecretResult) -> Vec<(String, String)> {
    result
        .iter()
        .map(|(key, value)| (env_name(key), raw_value(value)))
        .collect()
}

/// Replace every run of characters not valid in an env var name with `_`.
pub fn env_name(key: &str) -> String {
    INVALID_ENV_CHARS.replace_all(key, "_").into_owned()
}

fn quoted_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => format!("'{}'", s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => format!("'{}'", other),
    }
}

fn raw_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
