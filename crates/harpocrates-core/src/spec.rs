//! Secret specification documents.
//!
//! A document lists the secrets to fetch. Each entry is either a bare Vault
//! path or a map from path to options:
//!
//! ```yaml
//! format: env
//! prefix: APP_
//! secrets:
//!   - secret/data/shared
//!   - secret/data/db:
//!       format: json
//!       filename: db.json
//!   - secret/data/api:
//!       keys:
//!         - token
//!         - tls.cert:
//!             saveAsFile: true
//! ```
//!
//! Decoding walks the parsed value once and produces typed items, so the
//! engine never has to inspect raw shapes.

use crate::output::OutputFormat;
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::warn;

/// One entry of the `secrets` list.
#[derive(Debug, Clone, PartialEq)]
pub enum SecretItem {
    /// Fetch every field at this path into the default bucket.
    Path(String),
    /// A path with options.
    Configured { path: String, config: PathConfig },
}

impl SecretItem {
    pub fn path(&self) -> &str {
        match self {
            SecretItem::Path(path) => path,
            SecretItem::Configured { path, .. } => path,
        }
    }
}

/// Options for a configured path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathConfig {
    pub prefix: Option<String>,
    pub format: Option<OutputFormat>,
    pub filename: Option<String>,
    pub owner: Option<u32>,
    pub upper_case: Option<bool>,
    /// Empty means the whole secret goes to a dedicated bucket.
    pub keys: Vec<KeyItem>,
}

/// One entry of a path's `keys` list.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyItem {
    Name(String),
    Configured { name: String, config: KeyConfig },
}

/// Options for a configured key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyConfig {
    pub prefix: Option<String>,
    pub upper_case: Option<bool>,
    pub save_as_file: Option<bool>,
    /// Stored key name; the lookup still uses the original key.
    pub override_name: Option<String>,
}

/// A full input document: global options plus the secrets list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretDocument {
    pub append: Option<bool>,
    pub format: Option<OutputFormat>,
    pub output: Option<String>,
    pub owner: Option<u32>,
    pub prefix: Option<String>,
    pub upper_case: Option<bool>,
    /// Log in to Vault with a GCP workload identity token.
    pub gcp_workload_id: Option<bool>,
    pub secrets: Vec<SecretItem>,
}

impl SecretDocument {
    /// Parse a document from JSON, falling back to YAML.
    pub fn parse(input: &str) -> Result<Self> {
        let value = match serde_json::from_str::<Value>(input) {
            Ok(value) => value,
            Err(_) => serde_yaml::from_str::<Value>(input).map_err(|e| {
                Error::InvalidInput(format!(
                    "Your secret file contains an error, please refer to the documentation: {}",
                    e
                ))
            })?,
        };
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::InvalidInput(format!(
                "expected a document object, got {}",
                kind(value)
            )));
        };

        let mut document = SecretDocument::default();
        for (field, value) in map {
            match field.as_str() {
                "append" => document.append = opt_bool(value, field)?,
                "format" => document.format = opt_format(value, field)?,
                "output" => document.output = opt_string(value, field)?,
                "owner" => document.owner = opt_owner(value, field)?,
                "prefix" => document.prefix = opt_string(value, field)?,
                "uppercase" => document.upper_case = opt_bool(value, field)?,
                "gcpWorkloadID" => document.gcp_workload_id = opt_bool(value, field)?,
                "secrets" => document.secrets = decode_secrets(value)?,
                other => warn!(field = %other, "Ignoring unknown document field"),
            }
        }

        if document.secrets.is_empty() {
            return Err(Error::InvalidInput("No secrets provided".to_string()));
        }
        Ok(document)
    }
}

/// Decode a `secrets` list.
pub fn decode_secrets(value: &Value) -> Result<Vec<SecretItem>> {
    let Value::Array(entries) = value else {
        return Err(Error::MalformedSpecEntry(format!(
            "'secrets' must be a list, got {}",
            kind(value)
        )));
    };

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(path) if !path.is_empty() => items.push(SecretItem::Path(path.clone())),
            Value::Object(paths) if !paths.is_empty() => {
                for (path, config) in paths {
                    items.push(SecretItem::Configured {
                        path: path.clone(),
                        config: decode_path_config(path, config)?,
                    });
                }
            }
            other => {
                return Err(Error::MalformedSpecEntry(format!(
                    "expected a secret path or a map of path to options, got {}",
                    kind(other)
                )));
            }
        }
    }
    Ok(items)
}

fn decode_path_config(path: &str, value: &Value) -> Result<PathConfig> {
    let map = match value {
        Value::Null => return Ok(PathConfig::default()),
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedSpecEntry(format!(
                "options for '{}' must be a map, got {}",
                path,
                kind(other)
            )));
        }
    };

    let mut config = PathConfig::default();
    for (field, value) in map {
        match field.as_str() {
            "prefix" => config.prefix = opt_string(value, field)?,
            "format" => config.format = opt_format(value, field)?,
            "filename" => config.filename = opt_string(value, field)?,
            "owner" => config.owner = opt_owner(value, field)?,
            "uppercase" => config.upper_case = opt_bool(value, field)?,
            "keys" => config.keys = decode_keys(path, value)?,
            other => warn!(path = %path, field = %other, "Ignoring unknown path option"),
        }
    }
    Ok(config)
}

fn decode_keys(path: &str, value: &Value) -> Result<Vec<KeyItem>> {
    let entries = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        other => {
            return Err(Error::MalformedSpecEntry(format!(
                "'keys' of '{}' must be a list, got {}",
                path,
                kind(other)
            )));
        }
    };

    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(name) if !name.is_empty() => keys.push(KeyItem::Name(name.clone())),
            Value::Object(names) if !names.is_empty() => {
                for (name, config) in names {
                    keys.push(KeyItem::Configured {
                        name: name.clone(),
                        config: decode_key_config(path, name, config)?,
                    });
                }
            }
            other => {
                return Err(Error::MalformedSpecEntry(format!(
                    "expected a key name or a map of key to options in '{}', got {}",
                    path,
                    kind(other)
                )));
            }
        }
    }
    Ok(keys)
}

fn decode_key_config(path: &str, name: &str, value: &Value) -> Result<KeyConfig> {
    let map: &Map<String, Value> = match value {
        Value::Null => return Ok(KeyConfig::default()),
        Value::Object(map) => map,
        other => {
            return Err(Error::MalformedSpecEntry(format!(
                "options for key '{}' in '{}' must be a map, got {}",
                name,
                path,
                kind(other)
            )));
        }
    };

    let mut config = KeyConfig::default();
    for (field, value) in map {
        match field.as_str() {
            "prefix" => config.prefix = opt_string(value, field)?,
            "uppercase" => config.upper_case = opt_bool(value, field)?,
            "saveAsFile" => config.save_as_file = opt_bool(value, field)?,
            "overrideName" => config.override_name = opt_string(value, field)?,
            other => {
                warn!(path = %path, key = %name, field = %other, "Ignoring unknown key option")
            }
        }
    }
    Ok(config)
}

// Empty strings count as unset, so they never override an outer setting.
fn opt_string(value: &Value, field: &str) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(type_error(field, "a string", other)),
    }
}

fn opt_bool(value: &Value, field: &str) -> Result<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(type_error(field, "a boolean", other)),
    }
}

fn opt_format(value: &Value, field: &str) -> Result<Option<OutputFormat>> {
    opt_string(value, field)?
        .map(|format| format.parse())
        .transpose()
}

// A negative owner (conventionally -1) means "leave ownership alone".
fn opt_owner(value: &Value, field: &str) -> Result<Option<u32>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => match n.as_i64() {
            Some(uid) if uid < 0 => Ok(None),
            Some(uid) => u32::try_from(uid)
                .map(Some)
                .map_err(|_| type_error(field, "a valid uid", value)),
            None => Err(type_error(field, "an integer", value)),
        },
        other => Err(type_error(field, "an integer", other)),
    }
}

fn type_error(field: &str, expected: &str, got: &Value) -> Error {
    Error::MalformedSpecEntry(format!(
        "'{}' must be {}, got {}",
        field,
        expected,
        kind(got)
    ))
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_document() {
        let yaml = r#"
format: json
prefix: APP_
uppercase: true
owner: 1000
output: /tmp/secrets
secrets:
  - secret/data/shared
  - secret/data/db:
      format: yaml
      filename: db.yaml
      owner: -1
  - secret/data/api:
      prefix: API_
      keys:
        - token
        - tls.cert:
            saveAsFile: true
        - user:
            overrideName: username
            uppercase: false
"#;

        let doc = SecretDocument::parse(yaml).unwrap();
        assert_eq!(doc.format, Some(OutputFormat::Json));
        assert_eq!(doc.prefix.as_deref(), Some("APP_"));
        assert_eq!(doc.upper_case, Some(true));
        assert_eq!(doc.owner, Some(1000));
        assert_eq!(doc.output.as_deref(), Some("/tmp/secrets"));
        assert_eq!(doc.secrets.len(), 3);

        assert_eq!(doc.secrets[0], SecretItem::Path("secret/data/shared".to_string()));
        assert_eq!(
            doc.secrets[1],
            SecretItem::Configured {
                path: "secret/data/db".to_string(),
                config: PathConfig {
                    format: Some(OutputFormat::Yaml),
                    filename: Some("db.yaml".to_string()),
                    ..Default::default()
                },
            }
        );

        let SecretItem::Configured { config, .. } = &doc.secrets[2] else {
            panic!("expected configured path");
        };
        assert_eq!(config.prefix.as_deref(), Some("API_"));
        assert_eq!(config.keys[0], KeyItem::Name("token".to_string()));
        assert_eq!(
            config.keys[1],
            KeyItem::Configured {
                name: "tls.cert".to_string(),
                config: KeyConfig {
                    save_as_file: Some(true),
                    ..Default::default()
                },
            }
        );
        assert_eq!(
            config.keys[2],
            KeyItem::Configured {
                name: "user".to_string(),
                config: KeyConfig {
                    upper_case: Some(false),
                    override_name: Some("username".to_string()),
                    ..Default::default()
                },
            }
        );
    }

    #[test]
    fn test_parse_json_document() {
        let doc =
            SecretDocument::parse(r#"{"secrets": ["secret/data/a", {"secret/data/b": null}]}"#)
                .unwrap();

        assert_eq!(doc.secrets[0].path(), "secret/data/a");
        assert_eq!(
            doc.secrets[1],
            SecretItem::Configured {
                path: "secret/data/b".to_string(),
                config: PathConfig::default(),
            }
        );
    }

    #[test]
    fn test_multiple_paths_in_one_entry_keep_order() {
        let items = decode_secrets(&json!([
            { "secret/data/z": { "prefix": "Z_" }, "secret/data/a": { "prefix": "A_" } }
        ]))
        .unwrap();

        let paths: Vec<_> = items.iter().map(SecretItem::path).collect();
        assert_eq!(paths, vec!["secret/data/z", "secret/data/a"]);
    }

    #[test]
    fn test_no_secrets() {
        let err = SecretDocument::parse("format: env").unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg == "No secrets provided"));
    }

    #[test]
    fn test_malformed_entry() {
        let err = decode_secrets(&json!([42])).unwrap_err();
        assert!(matches!(err, Error::MalformedSpecEntry(msg) if msg.contains("number")));

        let err = decode_secrets(&json!([{ "secret/data/a": "oops" }])).unwrap_err();
        assert!(matches!(err, Error::MalformedSpecEntry(msg) if msg.contains("string")));
    }

    #[test]
    fn test_wrongly_typed_option() {
        let err =
            decode_secrets(&json!([{ "secret/data/a": { "uppercase": "yes" } }])).unwrap_err();
        assert!(matches!(err, Error::MalformedSpecEntry(msg) if msg.contains("uppercase")));
    }

    #[test]
    fn test_unknown_format() {
        let err = decode_secrets(&json!([{ "secret/data/a": { "format": "toml" } }])).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(f) if f == "toml"));
    }

    #[test]
    fn test_empty_prefix_is_unset() {
        let items = decode_secrets(&json!([{ "secret/data/a": { "prefix": "" } }])).unwrap();
        let SecretItem::Configured { config, .. } = &items[0] else {
            panic!("expected configured path");
        };
        assert_eq!(config.prefix, None);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let items = decode_secrets(&json!([{ "secret/data/a": { "append": true, "keys": ["k"] } }]))
            .unwrap();
        let SecretItem::Configured { config, .. } = &items[0] else {
            panic!("expected configured path");
        };
        assert_eq!(config.keys, vec![KeyItem::Name("k".to_string())]);
    }

    #[test]
    fn test_gcp_workload_id() {
        let doc = SecretDocument::parse("gcpWorkloadID: true\nsecrets: [kv/app]").unwrap();
        assert_eq!(doc.gcp_workload_id, Some(true));

        let err = SecretDocument::parse(r#"{"gcpWorkloadID": "yes", "secrets": ["kv/app"]}"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedSpecEntry(msg) if msg.contains("gcpWorkloadID")));
    }
}
