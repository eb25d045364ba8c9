//! Queue controller: translates queue operations into atomic store
//! operations and enforces the claim/lease rules.
//!
//! Design:
//! - The controller is stateless. Every call is one round-trip to the store;
//!   all item state lives there, all mutual exclusion is delegated to the
//!   store's find-and-modify atomicity.
//! - "Nothing matched" is `Ok(None)` everywhere, never an error. A worker
//!   whose lease was reclaimed sees `None` from release/complete/report_error
//!   and must not assume its work was recorded.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::QueueConfig;
use crate::domain::{NewItem, WorkItem};
use crate::error::QueueError;
use crate::stats::QueueStats;
use crate::store::{ItemFilter, ItemStore, ItemUpdate, Sort};

pub struct Queue {
    store: Arc<dyn ItemStore>,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
}

impl Queue {
    pub fn new(store: Arc<dyn ItemStore>, config: QueueConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn ItemStore>, config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Insert a new item, merging `fields` over the document defaults.
    pub async fn insert(&self, fields: Map<String, Value>) -> Result<WorkItem, QueueError> {
        let item = self.store.insert(NewItem::from_fields(fields)?).await?;
        debug!(id = %item.id, priority = item.priority, "inserted item");
        Ok(item)
    }

    /// Lease the unlocked, non-exhausted item with the highest priority.
    ///
    /// `locked_by` must be unique per active worker; it is what makes leases
    /// distinguishable. `Ok(None)` means nothing is eligible right now.
    pub async fn claim(&self, locked_by: &str) -> Result<Option<WorkItem>, QueueError> {
        let claimed = self
            .store
            .find_one_and_update(
                ItemFilter::Claimable {
                    max_attempts: self.config.max_attempts,
                },
                ItemUpdate::Lock {
                    locked_by: locked_by.to_string(),
                    locked_at: self.clock.now(),
                },
                Some(Sort::PriorityDesc),
            )
            .await?;
        if let Some(item) = &claimed {
            debug!(id = %item.id, locked_by, attempts = item.attempts, "claimed item");
        }
        Ok(claimed)
    }

    /// Clear the lease on `item`, but only while `locked_by` still holds it.
    ///
    /// Idempotent: a lease already cleared or reassigned fails the ownership
    /// check and the call is a no-op returning `Ok(None)`.
    pub async fn release(
        &self,
        item: &WorkItem,
        locked_by: &str,
    ) -> Result<Option<WorkItem>, QueueError> {
        let released = self
            .store
            .find_one_and_update(
                ItemFilter::Held {
                    id: item.id,
                    locked_by: locked_by.to_string(),
                },
                ItemUpdate::Unlock,
                None,
            )
            .await?;
        if released.is_some() {
            debug!(id = %item.id, locked_by, "released item");
        }
        Ok(released)
    }

    /// Remove `item` from the store, but only while `locked_by` still holds
    /// its lease. `Ok(None)` means the lease was reclaimed in the meantime:
    /// the item remains queued and the caller's work may be redelivered.
    pub async fn complete(
        &self,
        item: &WorkItem,
        locked_by: &str,
    ) -> Result<Option<WorkItem>, QueueError> {
        let removed = self
            .store
            .find_one_and_remove(ItemFilter::Held {
                id: item.id,
                locked_by: locked_by.to_string(),
            })
            .await?;
        if removed.is_some() {
            debug!(id = %item.id, locked_by, "completed item");
        }
        Ok(removed)
    }

    /// Record a failure: bump the stored attempt counter, set (or clear)
    /// `last_error`, and drop the lease, all in one conditional update.
    ///
    /// The ownership check matches release/complete, so a worker whose lease
    /// expired cannot clobber a lease another worker has since acquired.
    pub async fn report_error(
        &self,
        item: &WorkItem,
        message: Option<&str>,
    ) -> Result<Option<WorkItem>, QueueError> {
        let Some(locked_by) = item.locked_by.clone() else {
            return Ok(None);
        };
        let failed = self
            .store
            .find_one_and_update(
                ItemFilter::Held {
                    id: item.id,
                    locked_by,
                },
                ItemUpdate::Fail {
                    message: message.map(str::to_string),
                },
                None,
            )
            .await?;
        if let Some(item) = &failed {
            debug!(
                id = %item.id,
                attempts = item.attempts,
                error = message.unwrap_or(""),
                "recorded item failure"
            );
        }
        Ok(failed)
    }

    /// Release every lease older than the configured timeout, on behalf of
    /// its presumed-dead holder. Returns how many were reclaimed.
    ///
    /// Intended to run from a periodic maintenance caller; claim never
    /// reclaims implicitly. A lease refreshed between the scan and the
    /// release attempt fails the ownership check and is skipped.
    pub async fn reclaim_stale(&self) -> Result<usize, QueueError> {
        let cutoff = self.clock.now() - self.config.lease_timeout_chrono();
        let stale = self.store.find(ItemFilter::LockedBefore { cutoff }).await?;

        let mut reclaimed = 0;
        for item in stale {
            let Some(holder) = item.locked_by.clone() else {
                continue;
            };
            if self.release(&item, &holder).await?.is_some() {
                info!(id = %item.id, %holder, "reclaimed stale lease");
                reclaimed += 1;
            }
        }
        Ok(reclaimed)
    }

    /// Snapshot of the queue for diagnostics. Each bucket is one count call;
    /// cross-bucket consistency is as strong as the store's per-call
    /// atomicity.
    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let max_attempts = self.config.max_attempts;
        Ok(QueueStats {
            available: self
                .store
                .count(ItemFilter::Claimable { max_attempts })
                .await?,
            locked: self.store.count(ItemFilter::Locked).await?,
            errors: self
                .store
                .count(ItemFilter::Exhausted { max_attempts })
                .await?,
            total: self.store.count(ItemFilter::All).await?,
        })
    }

    /// Remove every item from the queue. Use with caution.
    pub async fn flush(&self) -> Result<(), QueueError> {
        self.store.clear().await
    }
}
