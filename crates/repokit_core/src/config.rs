//! Repository configuration.
//!
//! Loaded from the environment or deserialized from the host application's
//! own configuration file; every field has a default.

use crate::cache::DEFAULT_CACHE_EXPIRATION;
use crate::model::record::DEFAULT_BATCH_OPERATION_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATABASE_PATH: &str = "repokit.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Settings needed to build a repository over a SQLite database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub database_path: PathBuf,
    /// `None` disables the per-statement timeout.
    pub command_timeout_secs: Option<u64>,
    pub busy_timeout_ms: u64,
    pub cache_expiration_secs: u64,
    pub batch_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            command_timeout_secs: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            cache_expiration_secs: DEFAULT_CACHE_EXPIRATION.as_secs(),
            batch_size: DEFAULT_BATCH_OPERATION_SIZE,
        }
    }
}

impl RepositoryConfig {
    /// Reads `REPOKIT_*` environment variables, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            database_path: lookup("REPOKIT_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            command_timeout_secs: lookup("REPOKIT_COMMAND_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .or(defaults.command_timeout_secs),
            busy_timeout_ms: lookup("REPOKIT_BUSY_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.busy_timeout_ms),
            cache_expiration_secs: lookup("REPOKIT_CACHE_EXPIRATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_expiration_secs),
            batch_size: lookup("REPOKIT_BATCH_SIZE")
                .and_then(|s| s.parse().ok())
                .filter(|size: &usize| *size > 0)
                .unwrap_or(defaults.batch_size),
        }
    }

    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Default::default()
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }
}
