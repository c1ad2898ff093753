//! RecordStore: the seam between entity semantics and the physical store.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{BatchWriteOutput, Condition, Key, Page, QueryParams, Record, ScanParams};

/// Strongly consistent single-item reads/writes, conditional puts, batch
/// writes that may leave items unprocessed, and paged scans/queries over the
/// table or an eventually-consistent secondary index.
///
/// Implemented by `MemoryRecordStore` (tests, fixtures).
/// Also implemented for `Arc<S>` so one store can back several components.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError>;

    /// Write a record. With a condition, fails with `StoreError::ConditionFailed`
    /// when the precondition does not hold.
    async fn put(&self, record: Record, condition: Option<Condition>) -> Result<(), StoreError>;

    /// Write up to `MAX_BATCH_WRITE_ITEMS` records. Items the store could not
    /// take this round come back in `unprocessed`; the caller retries them.
    async fn batch_write(&self, records: Vec<Record>) -> Result<BatchWriteOutput, StoreError>;

    async fn scan(&self, params: ScanParams) -> Result<Page, StoreError>;

    async fn query(&self, params: QueryParams) -> Result<Page, StoreError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, record: Record, condition: Option<Condition>) -> Result<(), StoreError> {
        (**self).put(record, condition).await
    }

    async fn batch_write(&self, records: Vec<Record>) -> Result<BatchWriteOutput, StoreError> {
        (**self).batch_write(records).await
    }

    async fn scan(&self, params: ScanParams) -> Result<Page, StoreError> {
        (**self).scan(params).await
    }

    async fn query(&self, params: QueryParams) -> Result<Page, StoreError> {
        (**self).query(params).await
    }
}
