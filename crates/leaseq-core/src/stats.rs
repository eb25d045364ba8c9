use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of the queue, for diagnostics only.
///
/// `available` = unlocked and not exhausted, `locked` = currently leased,
/// `errors` = exhausted (attempts >= max_attempts), `total` = every document
/// in the collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub available: u64,
    pub locked: u64,
    pub errors: u64,
    pub total: u64,
}
