//! In-memory record store with fault injection. No external services required.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::store::RecordStore;
use crate::types::{
    BatchWriteOutput, Condition, Cursor, Key, Page, QueryParams, Record, ScanParams,
    SortKeyCondition, MAX_BATCH_WRITE_ITEMS,
};

/// In-memory `RecordStore`. Items are kept in primary-key order, so scans are
/// deterministic. Thread-safe.
///
/// Fault injection:
/// - `reject_in_batch_writes` makes a key come back unprocessed N times.
/// - `plant_index_entry` adds an index entry whose primary record is gone,
///   the way a lagging secondary index looks after a delete.
/// - `set_unavailable` makes every call fail as a connection error would.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<Key, Record>,
    phantom_index: Vec<(String, Record)>,
    unprocessed_plan: HashMap<Key, u32>,
    batch_write_calls: u32,
    unavailable: bool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of records in the table.
    pub fn len(&self) -> usize {
        self.inner().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().records.is_empty()
    }

    /// All records in primary-key order (for test assertions).
    pub fn records(&self) -> Vec<Record> {
        self.inner().records.values().cloned().collect()
    }

    /// How many times `batch_write` has been called.
    pub fn batch_write_calls(&self) -> u32 {
        self.inner().batch_write_calls
    }

    /// Report `key` as unprocessed for its next `times` batch writes.
    pub fn reject_in_batch_writes(&self, key: Key, times: u32) {
        self.inner().unprocessed_plan.insert(key, times);
    }

    /// Add a stale index entry. `snapshot` must carry a key for `index`; its
    /// primary key is expected not to exist in the table.
    pub fn plant_index_entry(&self, index: impl Into<String>, snapshot: Record) {
        self.inner().phantom_index.push((index.into(), snapshot));
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner().unavailable = unavailable;
    }

    /// Index entries in index order: (index key, primary key, record).
    fn index_entries(inner: &Inner, index: &str) -> Vec<(Key, Record)> {
        let mut entries: Vec<(Key, Record)> = inner
            .records
            .values()
            .chain(
                inner
                    .phantom_index
                    .iter()
                    .filter(|(name, _)| name == index)
                    .map(|(_, record)| record),
            )
            .filter_map(|record| {
                record
                    .index_key(index)
                    .map(|index_key| (index_key.clone(), record.clone()))
            })
            .collect();
        entries.sort_by(|(a_idx, a), (b_idx, b)| (a_idx, &a.key).cmp(&(b_idx, &b.key)));
        entries
    }

    fn check_available(inner: &Inner) -> Result<(), StoreError> {
        if inner.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }
}

fn condition_holds(existing: Option<&Record>, condition: &Condition) -> bool {
    match condition {
        Condition::NotExists => existing.is_none(),
        Condition::AttributeEquals { name, value } => existing
            .and_then(|record| record.attribute(name))
            .is_some_and(|current| current == value),
    }
}

fn matches_filter(record: &Record, filter: &BTreeMap<String, String>) -> bool {
    filter
        .iter()
        .all(|(name, value)| record.attribute(name) == Some(value.as_str()))
}

/// Examine up to `limit` entries, keep those passing `keep`, and hand back a
/// cursor when entries remain beyond the last one examined.
fn paginate<I>(entries: I, limit: usize, keep: impl Fn(&Record) -> bool) -> Page
where
    I: Iterator<Item = (Cursor, Record)>,
{
    let limit = limit.max(1);
    let mut entries = entries.peekable();
    let mut items = Vec::new();
    let mut last = None;
    let mut examined = 0;

    while examined < limit {
        let Some((cursor, record)) = entries.next() else {
            break;
        };
        examined += 1;
        if keep(&record) {
            items.push(record);
        }
        last = Some(cursor);
    }

    let last_evaluated = if entries.peek().is_some() { last } else { None };
    Page {
        items,
        last_evaluated,
    }
}

fn primary_cursor(key: &Key) -> Cursor {
    Cursor {
        primary: key.clone(),
        index: None,
    }
}

fn index_cursor(index_key: &Key, primary: &Key) -> Cursor {
    Cursor {
        primary: primary.clone(),
        index: Some(index_key.clone()),
    }
}

/// Split a cursor into the position it marks, validating it matches the
/// access path (table vs. index) being paged.
fn start_position(start: Option<&Cursor>, on_index: bool) -> Result<Option<(Key, Key)>, StoreError> {
    match (start, on_index) {
        (None, _) => Ok(None),
        (Some(Cursor { primary, index: None }), false) => {
            Ok(Some((primary.clone(), primary.clone())))
        }
        (Some(Cursor { primary, index: Some(index_key) }), true) => {
            Ok(Some((index_key.clone(), primary.clone())))
        }
        (Some(cursor), _) => Err(StoreError::InvalidCursor(format!(
            "cursor at {} cannot resume this {}",
            cursor.primary,
            if on_index { "index scan" } else { "table scan" }
        ))),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &Key) -> Result<Option<Record>, StoreError> {
        tokio::task::yield_now().await;
        let inner = self.inner();
        Self::check_available(&inner)?;
        Ok(inner.records.get(key).cloned())
    }

    async fn put(&self, record: Record, condition: Option<Condition>) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut inner = self.inner();
        Self::check_available(&inner)?;

        if let Some(condition) = &condition {
            if !condition_holds(inner.records.get(&record.key), condition) {
                return Err(StoreError::ConditionFailed { key: record.key });
            }
        }

        inner.records.insert(record.key.clone(), record);
        Ok(())
    }

    async fn batch_write(&self, records: Vec<Record>) -> Result<BatchWriteOutput, StoreError> {
        if records.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::BatchTooLarge {
                size: records.len(),
                max: MAX_BATCH_WRITE_ITEMS,
            });
        }

        tokio::task::yield_now().await;
        let mut inner = self.inner();
        Self::check_available(&inner)?;
        inner.batch_write_calls += 1;

        let mut output = BatchWriteOutput::default();
        for record in records {
            let rejected = match inner.unprocessed_plan.get_mut(&record.key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            };

            if rejected {
                debug!(key = %record.key, "Simulating unprocessed item");
                output.unprocessed.push(record);
            } else {
                inner.records.insert(record.key.clone(), record);
                output.consumed_capacity += 1.0;
            }
        }

        Ok(output)
    }

    async fn scan(&self, params: ScanParams) -> Result<Page, StoreError> {
        tokio::task::yield_now().await;
        let inner = self.inner();
        Self::check_available(&inner)?;
        let keep = |record: &Record| matches_filter(record, &params.attribute_filter);

        match &params.index {
            None => {
                let start = start_position(params.start.as_ref(), false)?;
                let entries = inner
                    .records
                    .iter()
                    .filter(|(key, _)| start.as_ref().is_none_or(|(_, after)| *key > after))
                    .map(|(key, record)| (primary_cursor(key), record.clone()));
                Ok(paginate(entries, params.limit, keep))
            }
            Some(index) => {
                let start = start_position(params.start.as_ref(), true)?;
                let entries = Self::index_entries(&inner, index)
                    .into_iter()
                    .filter(|(index_key, record)| {
                        start.as_ref().is_none_or(|(after_idx, after_primary)| {
                            (index_key, &record.key) > (after_idx, after_primary)
                        })
                    })
                    .map(|(index_key, record)| (index_cursor(&index_key, &record.key), record));
                Ok(paginate(entries, params.limit, keep))
            }
        }
    }

    async fn query(&self, params: QueryParams) -> Result<Page, StoreError> {
        tokio::task::yield_now().await;
        let inner = self.inner();
        Self::check_available(&inner)?;
        let sk: &SortKeyCondition = &params.sk;

        match &params.index {
            None => {
                let start = start_position(params.start.as_ref(), false)?;
                let entries = inner
                    .records
                    .iter()
                    .filter(|(key, _)| key.pk == params.pk && sk.matches(&key.sk))
                    .filter(|(key, _)| start.as_ref().is_none_or(|(_, after)| *key > after))
                    .map(|(key, record)| (primary_cursor(key), record.clone()));
                Ok(paginate(entries, params.limit, |_| true))
            }
            Some(index) => {
                let start = start_position(params.start.as_ref(), true)?;
                let entries = Self::index_entries(&inner, index)
                    .into_iter()
                    .filter(|(index_key, _)| index_key.pk == params.pk && sk.matches(&index_key.sk))
                    .filter(|(index_key, record)| {
                        start.as_ref().is_none_or(|(after_idx, after_primary)| {
                            (index_key, &record.key) > (after_idx, after_primary)
                        })
                    })
                    .map(|(index_key, record)| (index_cursor(&index_key, &record.key), record));
                Ok(paginate(entries, params.limit, |_| true))
            }
        }
    }
}
