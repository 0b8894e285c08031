//! Masking secret values in child process output.

use harpocrates_core::ResultBucket;
use harpocrates_core::format::env_pairs;

pub const REDACTED: &str = "[REDACTED]";

/// Replaces every known secret value in a line of output.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    values: Vec<String>,
}

impl Redactor {
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        let mut values: Vec<String> = values.into_iter().filter(|v| !v.is_empty()).collect();
        // Longest first, so a secret containing another is masked whole.
        values.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        values.dedup();
        Self { values }
    }

    /// Collect every value held by `buckets`.
    pub fn from_buckets(buckets: &[ResultBucket]) -> Self {
        Self::new(
            buckets
                .iter()
                .flat_map(|bucket| env_pairs(&bucket.result))
                .map(|(_, value)| value),
        )
    }

    pub fn redact(&self, line: &str) -> String {
        let mut output = line.to_string();
        for value in &self.values {
            output = output.replace(value.as_str(), REDACTED);
        }
        output
    }
}
