//! Query result cache collaborator.
//!
//! Query operations that receive a cache key look the key up here before
//! touching the database, and store fresh results under it afterwards.
//! Storage, eviction and expiry enforcement belong to the implementation.

use crate::model::record::Record;
use std::sync::Arc;
use std::time::Duration;

/// Expiration applied when neither the call nor the repository sets one.
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_secs(180 * 60);

pub trait Cache: Send + Sync {
    /// Returns unexpired rows stored under `key`.
    fn get(&self, key: &str) -> Option<Arc<Vec<Record>>>;

    fn add(&self, key: &str, rows: Arc<Vec<Record>>, expiration: Duration);

    fn remove(&self, key: &str);
}
