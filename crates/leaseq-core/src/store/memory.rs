//! In-memory item store.
//!
//! Reference backend and test double. One mutex guards the whole collection,
//! so every trait operation is trivially atomic — the same property a real
//! document store provides through its native find-and-modify.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ItemFilter, ItemStore, ItemUpdate, Sort};
use crate::clock::{Clock, SystemClock};
use crate::domain::{ItemId, NewItem, WorkItem};
use crate::error::QueueError;

struct StoreState {
    items: HashMap<ItemId, WorkItem>,
    /// Insertion sequence per item, the tie-break within a priority.
    seq: HashMap<ItemId, u64>,
    next_seq: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            items: HashMap::new(),
            seq: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Pick the one item a find-and-modify operates on.
    ///
    /// `PriorityDesc` takes the highest priority, oldest first within it.
    /// Without a sort the oldest match wins, which keeps selection
    /// deterministic for tests.
    fn select_one(&self, filter: &ItemFilter, sort: Option<Sort>) -> Option<ItemId> {
        let mut best: Option<(&WorkItem, u64)> = None;
        for item in self.items.values().filter(|item| filter.matches(item)) {
            let seq = self.seq.get(&item.id).copied().unwrap_or(u64::MAX);
            let better = match (&best, sort) {
                (None, _) => true,
                (Some((leader, leader_seq)), Some(Sort::PriorityDesc)) => {
                    item.priority > leader.priority
                        || (item.priority == leader.priority && seq < *leader_seq)
                }
                (Some((_, leader_seq)), None) => seq < *leader_seq,
            };
            if better {
                best = Some((item, seq));
            }
        }
        best.map(|(item, _)| item.id)
    }
}

/// `ItemStore` backed by process memory.
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// The clock feeds the timestamp half of generated ids, so a fixed clock
    /// yields ids whose ordering the test controls via the sequence counter.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::new())),
            clock,
        }
    }

    fn generate_id(&self, state: &StoreState) -> ItemId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let mut id = ItemId::from_parts(timestamp_ms, rand::random());
        while state.items.contains_key(&id) {
            id = ItemId::from_parts(timestamp_ms, rand::random());
        }
        id
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn insert(&self, new: NewItem) -> Result<WorkItem, QueueError> {
        let mut state = self.state.lock().await;
        let id = self.generate_id(&state);
        let item = new.into_item(id);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.seq.insert(id, seq);
        state.items.insert(id, item.clone());
        Ok(item)
    }

    async fn find_one_and_update(
        &self,
        filter: ItemFilter,
        update: ItemUpdate,
        sort: Option<Sort>,
    ) -> Result<Option<WorkItem>, QueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.select_one(&filter, sort) else {
            return Ok(None);
        };
        let Some(item) = state.items.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(item);
        Ok(Some(item.clone()))
    }

    async fn find_one_and_remove(
        &self,
        filter: ItemFilter,
    ) -> Result<Option<WorkItem>, QueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.select_one(&filter, None) else {
            return Ok(None);
        };
        state.seq.remove(&id);
        Ok(state.items.remove(&id))
    }

    async fn find(&self, filter: ItemFilter) -> Result<Vec<WorkItem>, QueueError> {
        let state = self.state.lock().await;
        let mut matches: Vec<WorkItem> = state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect();
        matches.sort_by_key(|item| state.seq.get(&item.id).copied().unwrap_or(u64::MAX));
        Ok(matches)
    }

    async fn count(&self, filter: ItemFilter) -> Result<u64, QueueError> {
        let state = self.state.lock().await;
        Ok(state.items.values().filter(|item| filter.matches(item)).count() as u64)
    }

    async fn clear(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.items.clear();
        state.seq.clear();
        Ok(())
    }
}
