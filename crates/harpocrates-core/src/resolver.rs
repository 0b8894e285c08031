//! Key path resolution against fetched secret trees.
//!
//! A key expression addresses a value inside a secret. Supported forms:
//! - `password` - a top-level field
//! - `database.password` - nested maps
//! - `users[0].name` / `users.0.name` - array elements
//! - `key.with.dots` - a field whose name itself contains dots
//!
//! Brackets are normalized to dots, so `a[b]` and `a.b` always address the
//! same value. A literal field name always wins over a traversal.

use crate::{Error, Result};
use serde_json::{Map, Value};

/// Resolve `expression` against a fetched secret.
pub fn resolve<'a>(tree: &'a Map<String, Value>, expression: &str) -> Option<&'a Value> {
    if let Some(value) = tree.get(expression) {
        return Some(value);
    }

    let segments = segments(expression);
    if segments.is_empty() {
        return None;
    }
    walk_object(tree, &segments)
}

/// Resolve `key` in the secret read from `path`, failing with `KeyNotFound`.
pub fn resolve_key(tree: &Map<String, Value>, path: &str, key: &str) -> Result<Value> {
    resolve(tree, key)
        .cloned()
        .ok_or_else(|| Error::key_not_found(path, key))
}

/// Split an expression into path segments, treating `[` and `]` as separators.
pub fn segments(expression: &str) -> Vec<&str> {
    expression
        .split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .collect()
}

fn walk<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(node);
    };

    match node {
        Value::Object(map) => walk_object(map, segments),
        Value::Array(items) => parse_index(first)
            .and_then(|index| items.get(index))
            .and_then(|item| walk(item, rest)),
        _ => None,
    }
}

// Longest join of the remaining segments first, so a literal dotted field
// shadows a nested structure at every level, not only at the root.
fn walk_object<'a>(map: &'a Map<String, Value>, segments: &[&str]) -> Option<&'a Value> {
    for end in (1..=segments.len()).rev() {
        let candidate = segments[..end].join(".");
        if let Some(child) = map.get(&candidate)
            && let Some(found) = walk(child, &segments[end..])
        {
            return Some(found);
        }
    }
    None
}

fn parse_index(segment: &str) -> Option<usize> {
    if !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}
