//! Item store port: the atomic document-store primitives the queue is
//! written against.
//!
//! Design:
//! - Predicates and updates are closed enums, not closures, so a backend can
//!   translate them to its native query language and the in-memory store can
//!   evaluate them directly.
//! - `find_one_and_update` / `find_one_and_remove` are the only
//!   synchronization primitives in the protocol. A backend that implements
//!   them as a plain read-then-write pair breaks mutual exclusion.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ItemId, NewItem, WorkItem};
use crate::error::QueueError;

/// Predicate over stored items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFilter {
    /// Every document in the collection.
    All,
    /// Unlocked and below the attempt bound; what claim competes for.
    Claimable { max_attempts: u32 },
    /// A specific item whose lease is still held by `locked_by`.
    Held { id: ItemId, locked_by: String },
    /// Currently leased, regardless of holder.
    Locked,
    /// Leased, with the lease started strictly before `cutoff`.
    LockedBefore { cutoff: DateTime<Utc> },
    /// Attempts exhausted; visible only to inspection.
    Exhausted { max_attempts: u32 },
}

impl ItemFilter {
    pub fn matches(&self, item: &WorkItem) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::Claimable { max_attempts } => {
                !item.is_locked() && !item.is_exhausted(*max_attempts)
            }
            ItemFilter::Held { id, locked_by } => {
                item.id == *id && item.locked_by.as_deref() == Some(locked_by.as_str())
            }
            ItemFilter::Locked => item.is_locked(),
            ItemFilter::LockedBefore { cutoff } => {
                item.is_locked() && item.locked_at.is_some_and(|at| at < *cutoff)
            }
            ItemFilter::Exhausted { max_attempts } => item.is_exhausted(*max_attempts),
        }
    }
}

/// Mutation applied by `find_one_and_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemUpdate {
    /// Take the lease: set both lease fields together.
    Lock {
        locked_by: String,
        locked_at: DateTime<Utc>,
    },
    /// Clear the lease: unset both fields together.
    Unlock,
    /// Release with a failure annotation: bump `attempts` on the stored
    /// document, record (or clear) `last_error`, and drop the lease.
    Fail { message: Option<String> },
}

impl ItemUpdate {
    pub fn apply(&self, item: &mut WorkItem) {
        match self {
            ItemUpdate::Lock {
                locked_by,
                locked_at,
            } => {
                item.locked_by = Some(locked_by.clone());
                item.locked_at = Some(*locked_at);
            }
            ItemUpdate::Unlock => {
                item.locked_by = None;
                item.locked_at = None;
            }
            ItemUpdate::Fail { message } => {
                item.attempts = item.attempts.saturating_add(1);
                item.last_error = message.clone();
                item.locked_by = None;
                item.locked_at = None;
            }
        }
    }
}

/// Selection order for `find_one_and_update`.
///
/// Ties within a priority are broken by item id ascending, which for ULID
/// ids means insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    PriorityDesc,
}

/// The document-store capabilities the queue controller consumes.
///
/// Implementations must make `find_one_and_update` and `find_one_and_remove`
/// atomic: predicate evaluation and mutation happen as one indivisible step,
/// and no concurrent call may observe the document in between.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Store a new item, assigning its id, and return the stored document.
    async fn insert(&self, new: NewItem) -> Result<WorkItem, QueueError>;

    /// Atomically select one matching item (first under `sort`, else any
    /// deterministic order), apply `update`, and return the document as it
    /// is after the update. `Ok(None)` when nothing matches.
    async fn find_one_and_update(
        &self,
        filter: ItemFilter,
        update: ItemUpdate,
        sort: Option<Sort>,
    ) -> Result<Option<WorkItem>, QueueError>;

    /// Atomically remove one matching item, returning it. `Ok(None)` when
    /// nothing matches.
    async fn find_one_and_remove(
        &self,
        filter: ItemFilter,
    ) -> Result<Option<WorkItem>, QueueError>;

    /// Non-atomic scan of every matching item.
    async fn find(&self, filter: ItemFilter) -> Result<Vec<WorkItem>, QueueError>;

    /// Count matching items.
    async fn count(&self, filter: ItemFilter) -> Result<u64, QueueError>;

    /// Remove every document. Use with caution.
    async fn clear(&self) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn item(attempts: u32, locked_by: Option<&str>) -> WorkItem {
        WorkItem {
            id: ItemId::from_parts(1, 1),
            priority: 0,
            attempts,
            locked_by: locked_by.map(str::to_string),
            locked_at: locked_by.map(|_| Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            last_error: None,
            payload: serde_json::Map::new(),
        }
    }

    #[rstest]
    #[case::fresh(0, None, true)]
    #[case::below_bound(2, None, true)]
    #[case::exhausted(3, None, false)]
    #[case::over_bound(4, None, false)]
    #[case::locked(0, Some("w1"), false)]
    fn claimable_eligibility(
        #[case] attempts: u32,
        #[case] locked_by: Option<&str>,
        #[case] eligible: bool,
    ) {
        let filter = ItemFilter::Claimable { max_attempts: 3 };
        assert_eq!(filter.matches(&item(attempts, locked_by)), eligible);
    }

    #[test]
    fn held_requires_both_id_and_holder() {
        let held = item(0, Some("w1"));
        let filter = ItemFilter::Held {
            id: held.id,
            locked_by: "w1".to_string(),
        };
        assert!(filter.matches(&held));

        let wrong_holder = ItemFilter::Held {
            id: held.id,
            locked_by: "w2".to_string(),
        };
        assert!(!wrong_holder.matches(&held));

        let unlocked = item(0, None);
        assert!(!filter.matches(&unlocked));
    }

    #[test]
    fn locked_before_is_strict() {
        let held = item(0, Some("w1"));
        let at = held.locked_at.unwrap();

        assert!(!ItemFilter::LockedBefore { cutoff: at }.matches(&held));
        assert!(
            ItemFilter::LockedBefore {
                cutoff: at + chrono::Duration::seconds(1)
            }
            .matches(&held)
        );
    }

    #[test]
    fn fail_update_bumps_attempts_and_drops_lease() {
        let mut held = item(1, Some("w1"));
        ItemUpdate::Fail {
            message: Some("boom".to_string()),
        }
        .apply(&mut held);

        assert_eq!(held.attempts, 2);
        assert_eq!(held.last_error.as_deref(), Some("boom"));
        assert_eq!(held.locked_by, None);
        assert_eq!(held.locked_at, None);
    }

    #[test]
    fn fail_update_without_message_clears_last_error() {
        let mut held = item(0, Some("w1"));
        held.last_error = Some("old".to_string());
        ItemUpdate::Fail { message: None }.apply(&mut held);
        assert_eq!(held.last_error, None);
        assert_eq!(held.attempts, 1);
    }

    #[test]
    fn lock_and_unlock_move_both_lease_fields_together() {
        let mut doc = item(0, None);
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ItemUpdate::Lock {
            locked_by: "w1".to_string(),
            locked_at: at,
        }
        .apply(&mut doc);
        assert_eq!(doc.locked_by.as_deref(), Some("w1"));
        assert_eq!(doc.locked_at, Some(at));

        ItemUpdate::Unlock.apply(&mut doc);
        assert_eq!(doc.locked_by, None);
        assert_eq!(doc.locked_at, None);
    }
}
