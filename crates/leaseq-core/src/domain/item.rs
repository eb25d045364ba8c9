//! Work item document and its insertion form.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ItemId;
use crate::error::QueueError;

/// A queued unit of work as stored in the collection.
///
/// The lease is the (`locked_by`, `locked_at`) pair: both set or both unset,
/// never one without the other. `attempts` only ever grows, and only via
/// a reported error. Caller-supplied payload fields ride along untyped in
/// `payload` and are opaque to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: ItemId,
    pub priority: i64,
    pub attempts: u32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl WorkItem {
    pub fn is_locked(&self) -> bool {
        self.locked_by.is_some()
    }

    /// Permanently ineligible for claim; kept only for inspection.
    pub fn is_exhausted(&self, max_attempts: u32) -> bool {
        self.attempts >= max_attempts
    }

    /// Whether the lease began strictly before `now - lease_timeout`.
    pub fn lease_expired(&self, now: DateTime<Utc>, lease_timeout: chrono::Duration) -> bool {
        match self.locked_at {
            Some(locked_at) => self.is_locked() && locked_at < now - lease_timeout,
            None => false,
        }
    }
}

/// An item about to be inserted: caller fields merged over the defaults
/// (`priority = 0`, `attempts = 0`, unlocked, no error).
///
/// `priority`, `attempts` and `last_error` may be overridden by the caller;
/// the lease fields are protocol-managed and always start unset. Everything
/// unrecognized becomes payload.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub priority: i64,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub payload: Map<String, Value>,
}

impl NewItem {
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, QueueError> {
        let priority = take_field(&mut fields, "priority")?.unwrap_or(0);
        let attempts = take_field(&mut fields, "attempts")?.unwrap_or(0);
        let last_error = take_field(&mut fields, "last_error")?;
        fields.remove("locked_by");
        fields.remove("locked_at");
        Ok(Self {
            priority,
            attempts,
            last_error,
            payload: fields,
        })
    }

    /// Materialize as a stored document under the id the store assigned.
    pub fn into_item(self, id: ItemId) -> WorkItem {
        WorkItem {
            id,
            priority: self.priority,
            attempts: self.attempts,
            locked_by: None,
            locked_at: None,
            last_error: self.last_error,
            payload: self.payload,
        }
    }
}

/// Pop `key` out of the map, decoding it if present. Explicit nulls count
/// as absent so callers can pass the document shape back in unchanged.
fn take_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, QueueError> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}
