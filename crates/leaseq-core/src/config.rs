//! Queue configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration captured once at construction and shared read-only.
///
/// `database` and `collection` are connection hints for document-store
/// backends; the in-memory store ignores them. `lease_timeout` must exceed
/// the worst-case processing time of a consumer, or the reaper will redeliver
/// items that are still legitimately being worked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub database: String,
    pub collection: String,
    pub lease_timeout: Duration,
    pub max_attempts: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            database: "mongo_queue".to_string(),
            collection: "mongo_queue".to_string(),
            lease_timeout: Duration::from_secs(300),
            max_attempts: 3,
        }
    }
}

impl QueueConfig {
    /// Lease timeout as a chrono duration, for timestamp arithmetic.
    pub fn lease_timeout_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lease_timeout.as_secs() as i64)
    }
}
