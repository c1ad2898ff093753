//! Raw key-value primitives over a wide-column store.
//!
//! Records are a primary key pair, optional secondary-index key pairs,
//! a handful of structured string attributes, and an opaque JSON blob.
//! Zero knowledge of resources, tickets, or files.

pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use memory::MemoryRecordStore;
pub use store::RecordStore;
pub use types::{
    BatchWriteOutput, Condition, Cursor, Key, Page, QueryParams, Record, ScanParams,
    SortKeyCondition, MAX_BATCH_WRITE_ITEMS,
};
