//! Harpocrates Core
//!
//! Secret specification model, key path resolution, and the extraction
//! engine that turns a specification into result buckets. This crate does
//! no I/O of its own; secret stores and output locations are reached through
//! the traits in [`ports`].

pub mod context;
pub mod engine;
pub mod error;
pub mod format;
pub mod output;
pub mod ports;
pub mod resolver;
pub mod spec;

pub use context::{ContextSettings, ExtractionContext};
pub use engine::Extractor;
pub use error::{Error, Result};
pub use output::{BucketKind, OutputAggregator, OutputFormat, ResultBucket, SecretResult};
pub use ports::{SecretFetcher, SecretWriter};
pub use spec::{KeyConfig, KeyItem, PathConfig, SecretDocument, SecretItem};
