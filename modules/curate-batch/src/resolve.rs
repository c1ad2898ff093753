//! Key resolution: index entries are advisory, primary records are not.
//!
//! An index key is looked up in its index to find the primary key, and the
//! primary record is then read directly. The item fails with `StaleIndex`,
//! on its own, when either step comes back empty or the primary record no
//! longer carries the index key it was reached through.

use std::sync::Arc;

use curate_store::{Key, QueryParams, Record, RecordStore};
use futures::stream::{self, StreamExt};
use tracing::warn;

use crate::error::ItemError;
use crate::types::WorkKey;

pub struct KeyResolver {
    store: Arc<dyn RecordStore>,
    concurrency: usize,
}

impl KeyResolver {
    pub fn new(store: Arc<dyn RecordStore>, concurrency: usize) -> Self {
        Self {
            store,
            concurrency: concurrency.max(1),
        }
    }

    /// Resolve many keys concurrently. Output order matches input order.
    pub async fn resolve_all<'a, I>(&self, keys: I) -> Vec<Result<Record, ItemError>>
    where
        I: IntoIterator<Item = &'a WorkKey>,
    {
        let mut resolved: Vec<(usize, Result<Record, ItemError>)> =
            stream::iter(keys.into_iter().enumerate())
                .map(|(position, key)| async move { (position, self.resolve(key).await) })
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
        resolved.sort_by_key(|(position, _)| *position);
        resolved.into_iter().map(|(_, result)| result).collect()
    }

    /// The primary record a work key refers to, confirmed against the table.
    pub async fn resolve(&self, key: &WorkKey) -> Result<Record, ItemError> {
        let primary = match &key.index_name {
            None => key.key(),
            Some(index) => self.lookup_index(index, &key.key()).await?,
        };

        match self.store.get(&primary).await {
            Ok(Some(record)) => match &key.index_name {
                Some(index) if record.index_key(index) != Some(&key.key()) => {
                    warn!(
                        %index,
                        key = %key.key(),
                        %primary,
                        "Index entry no longer matches its record"
                    );
                    Err(ItemError::StaleIndex {
                        index: index.clone(),
                        key: key.key(),
                    })
                }
                _ => Ok(record),
            },
            Ok(None) => match &key.index_name {
                Some(index) => {
                    warn!(%index, key = %key.key(), %primary, "Index entry points at a missing record");
                    Err(ItemError::StaleIndex {
                        index: index.clone(),
                        key: key.key(),
                    })
                }
                None => Err(ItemError::Missing(primary)),
            },
            Err(e) => Err(ItemError::Store(e.to_string())),
        }
    }

    async fn lookup_index(&self, index: &str, index_key: &Key) -> Result<Key, ItemError> {
        let page = self
            .store
            .query(QueryParams::index_key(index, index_key, 1))
            .await
            .map_err(|e| ItemError::Store(e.to_string()))?;

        match page.items.into_iter().next() {
            Some(entry) => Ok(entry.key),
            None => {
                warn!(%index, key = %index_key, "Index lookup returned nothing");
                Err(ItemError::StaleIndex {
                    index: index.to_string(),
                    key: index_key.clone(),
                })
            }
        }
    }
}
