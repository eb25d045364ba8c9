//! Domain model: item identifiers and the work item document.

mod id;
mod item;

pub use id::ItemId;
pub use item::{NewItem, WorkItem};
