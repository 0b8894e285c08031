//! HashiCorp Vault adapter for Harpocrates.
//!
//! Implements [`harpocrates_core::SecretFetcher`] over the Vault HTTP API,
//! handling both KV v1 and KV v2 mounts, plus token, JWT and GCP workload identity login.

pub mod auth;
pub mod client;
pub mod error;
pub mod providers;

pub use auth::{DEFAULT_GCP_METADATA_URL, DEFAULT_TOKEN_PATH, VaultAuth};
pub use client::{VaultClient, VaultConfig};
pub use error::VaultError;
pub use providers::StaticFetcher;
