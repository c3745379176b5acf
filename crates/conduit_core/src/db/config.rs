//! Storage configuration loaded from the process environment.
//!
//! # Responsibility
//! - Describe where the database lives and how the storer fetches children.
//! - Parse `CONDUIT_*` environment variables into typed settings.
//!
//! # Invariants
//! - Missing variables fall back to defaults; malformed ones are errors.
//! - An absent `db_path` selects an in-memory database.

use crate::repo::sqlite_storer::{ChildFetch, DEFAULT_BATCH_SIZE};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "CONDUIT_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "CONDUIT_DB_BUSY_TIMEOUT_MS";
/// `0` selects one child query per order instead of batched `IN` queries.
pub const ENV_ITEM_BATCH_SIZE: &str = "CONDUIT_ITEM_BATCH_SIZE";

pub(super) const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{key}` must be an unsigned integer, got `{value}`")]
    InvalidNumber { key: &'static str, value: String },
    #[error("`{key}` cannot be empty")]
    Empty { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub db_path: Option<PathBuf>,
    pub busy_timeout: Duration,
    pub child_fetch: ChildFetch,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            child_fetch: ChildFetch::Batched {
                chunk_size: DEFAULT_BATCH_SIZE,
            },
        }
    }
}

impl StoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a key to its raw value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DB_PATH) {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::Empty { key: ENV_DB_PATH });
            }
            config.db_path = Some(PathBuf::from(trimmed));
        }

        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            let millis = parse_u64(ENV_BUSY_TIMEOUT_MS, &raw)?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(raw) = lookup(ENV_ITEM_BATCH_SIZE) {
            let size = parse_u64(ENV_ITEM_BATCH_SIZE, &raw)?;
            config.child_fetch = if size == 0 {
                ChildFetch::PerParent
            } else {
                ChildFetch::Batched {
                    chunk_size: usize::try_from(size).unwrap_or(usize::MAX),
                }
            };
        }

        Ok(config)
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })
}
