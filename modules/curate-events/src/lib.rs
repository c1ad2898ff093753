//! Append-only event history on top of a `RecordStore`.
//!
//! One row per applied event, keyed (`History:{kind}:{entityId}`, `{eventId}`).
//! Rows are never rewritten. Knows nothing about individual event variants:
//! anything implementing `LifecycleEvent` can be stored, and anything
//! implementing `Aggregate` can be replayed.

pub mod error;
pub mod history;
pub mod types;

pub use error::HistoryError;
pub use history::{Appended, EventHistory};
pub use types::{history_pk, StoredEvent};
