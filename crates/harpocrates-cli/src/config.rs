//! Command-line options and the settings derived from them.

use anyhow::{Context, bail};
use clap::Args;
use harpocrates_core::{ContextSettings, OutputFormat, SecretDocument};
use harpocrates_vault::{DEFAULT_TOKEN_PATH, VaultAuth, VaultConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::status::DEFAULT_STATUS_PORT;

pub const DEFAULT_OUTPUT: &str = "/secrets";
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// File that contains the secrets document
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Vault address, e.g. https://vault.example.com
    #[arg(long, env = "VAULT_ADDR", global = true)]
    pub vault_address: Option<String>,

    /// Kubernetes/JWT auth mount name
    #[arg(long, env = "AUTH_NAME", global = true)]
    pub auth_name: Option<String>,

    /// Role to log in as on the auth mount
    #[arg(long, env = "ROLE_NAME", global = true)]
    pub role_name: Option<String>,

    /// Path to the JWT exchanged for a Vault token
    #[arg(long, env = "TOKEN_PATH", global = true)]
    pub token_path: Option<PathBuf>,

    /// Log in with a GCP workload identity token from the metadata server
    #[arg(long, env = "GCP_WORKLOAD_ID", global = true)]
    pub gcp_workload_id: bool,

    /// Vault token in clear text
    #[arg(long, env = "VAULT_TOKEN", hide_env_values = true, global = true)]
    pub vault_token: Option<String>,

    /// Output format: json, env, yaml or secret [default: env]
    #[arg(long, env = "FORMAT", global = true)]
    pub format: Option<OutputFormat>,

    /// Directory the secret files are written to
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// UID that will own the written files
    #[arg(long, global = true)]
    pub owner: Option<u32>,

    /// Key prefix, e.g. TEST_ produces TEST_key=secret
    #[arg(long, env = "PREFIX", global = true)]
    pub prefix: Option<String>,

    /// Convert keys to UPPERCASE
    #[arg(long, global = true)]
    pub uppercase: bool,

    /// Append to existing files instead of truncating them
    #[arg(long, global = true)]
    pub append: bool,

    /// Name of the default output file
    #[arg(long, env = "HARPOCRATES_FILENAME", default_value = "secrets", global = true)]
    pub filename: String,

    /// Vault paths to fetch whole, comma separated
    #[arg(long, value_delimiter = ',', global = true)]
    pub secret: Vec<String>,

    /// Only check the secrets document
    #[arg(long, global = true)]
    pub validate: bool,

    /// Log level or tracing filter directive
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Keep refreshing the secrets every --interval
    #[arg(long, env = "CONTINUOUS", global = true)]
    pub continuous: bool,

    /// Refresh interval in continuous mode, e.g. 90s, 5m or 1h30m
    #[arg(long, env = "INTERVAL", value_parser = parse_interval, global = true)]
    pub interval: Option<Duration>,

    /// Address of the continuous mode status endpoint [default: 0.0.0.0:8000]
    #[arg(long, global = true)]
    pub status_addr: Option<SocketAddr>,

    /// Serve secrets from a JSON snapshot instead of Vault
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,
}

/// Effective settings for one run. Values from the secrets document win over
/// command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub format: OutputFormat,
    pub prefix: String,
    pub upper_case: bool,
    pub append: bool,
    pub owner: Option<u32>,
    pub output: PathBuf,
    pub filename: String,
}

impl Settings {
    pub fn resolve(args: &CliArgs, document: &SecretDocument) -> Self {
        Self {
            format: document.format.or(args.format).unwrap_or_default(),
            prefix: document
                .prefix
                .clone()
                .or_else(|| args.prefix.clone())
                .unwrap_or_default(),
            upper_case: document.upper_case.unwrap_or(args.uppercase),
            append: document.append.unwrap_or(args.append),
            owner: document.owner.or(args.owner),
            output: args
                .output
                .clone()
                .or_else(|| document.output.as_deref().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            filename: args.filename.clone(),
        }
    }

    /// Context the extraction starts from and returns to between entries.
    pub fn defaults(&self) -> ContextSettings {
        ContextSettings::new(self.prefix.clone(), self.upper_case, self.format)
    }
}

impl CliArgs {
    pub fn vault_config(&self) -> VaultConfig {
        match &self.vault_address {
            Some(address) => VaultConfig::new(address.clone()),
            None => VaultConfig::default(),
        }
    }

    /// Pick the Vault credentials: an explicit token, then GCP workload
    /// identity when enabled here or in the document, then a JWT login, then
    /// the token cached by the Vault CLI.
    pub fn vault_auth(&self, document: &SecretDocument) -> anyhow::Result<VaultAuth> {
        if let Some(token) = self.vault_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(VaultAuth::Token(token.clone()));
        }

        if self.gcp_workload_id || document.gcp_workload_id == Some(true) {
            let Some(role) = self.role_name.as_ref().or(self.auth_name.as_ref()) else {
                bail!("GCP workload identity needs --role-name or --auth-name");
            };
            return Ok(VaultAuth::gcp(role.clone()));
        }

        if let (Some(auth_name), Some(role_name)) = (&self.auth_name, &self.role_name) {
            return Ok(VaultAuth::Jwt {
                auth_name: auth_name.clone(),
                role_name: role_name.clone(),
                token_path: self
                    .token_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            });
        }

        if let Some(path) = cached_token_path()
            && path.exists()
        {
            let token = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(VaultAuth::Token(token.trim().to_string()));
        }

        bail!("No Vault credentials: set --vault-token, or --auth-name and --role-name")
    }

    pub fn status_addr(&self) -> SocketAddr {
        self.status_addr
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], DEFAULT_STATUS_PORT)))
    }

    /// Refresh interval when continuous mode is on.
    pub fn refresh_interval(&self) -> anyhow::Result<Option<Duration>> {
        if !self.continuous {
            return Ok(None);
        }
        match self.interval {
            Some(interval) => Ok(Some(interval)),
            None => bail!("--interval is required in continuous mode"),
        }
    }
}

fn cached_token_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".vault-token"))
}

/// Parse a duration such as `90s`, `5m` or `1h30m`. At least one minute.
pub fn parse_interval(input: &str) -> Result<Duration, String> {
    let duration = parse_duration(input.trim())?;
    if duration < MIN_INTERVAL {
        return Err("interval must be at least 1 minute".to_string());
    }
    Ok(duration)
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    if input.is_empty() {
        return Err("duration cannot be empty".to_string());
    }

    let mut total = 0f64;
    let mut number = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }

        let mut unit = c.to_string();
        if c == 'm' && chars.peek() == Some(&'s') {
            unit.push('s');
            chars.next();
        }
        let seconds = match unit.as_str() {
            "h" => 3600.0,
            "m" => 60.0,
            "s" => 1.0,
            "ms" => 0.001,
            _ => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration '{}'", input))?;
        total += value * seconds;
        number.clear();
    }

    if !number.is_empty() {
        return Err(format!("missing unit in duration '{}'", input));
    }
    Duration::try_from_secs_f64(total).map_err(|_| format!("duration '{}' is too large", input))
}

/// Read the secrets document from a file.
pub fn read_document_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
