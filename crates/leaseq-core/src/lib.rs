//! leaseq-core
//!
//! A durable, priority-ordered work queue built atop a document store's
//! atomic find-and-modify primitive.
//!
//! # Modules
//! - **domain**: the work item document and its identifier
//! - **store**: the `ItemStore` port (typed filters/updates) and the
//!   in-memory reference backend
//! - **queue**: the stateless controller implementing the claim/lease/retry
//!   protocol
//! - **worker**: a worker group driving claim -> process -> complete/error
//! - **reaper**: the periodic stale-lease reclaim loop
//! - **clock**, **config**, **stats**, **error**: supporting pieces
//!
//! # Delivery semantics
//! At-least-once: a consumer can crash after claiming and before completing,
//! and the item is redelivered once its lease expires and the reaper runs.
//! Mutual exclusion of concurrent claims rests entirely on the store's
//! find-and-modify atomicity; the controller holds no locks of its own.

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod queue;
pub mod reaper;
pub mod stats;
pub mod store;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::QueueConfig;
pub use domain::{ItemId, NewItem, WorkItem};
pub use error::QueueError;
pub use queue::Queue;
pub use reaper::Reaper;
pub use stats::QueueStats;
pub use store::{InMemoryStore, ItemFilter, ItemStore, ItemUpdate, Sort};
pub use worker::{ItemHandler, WorkerGroup};
