//! EventHistory: append-only rows, read back in occurrence order.
//!
//! Ordering is by event timestamp, ties broken by event id. Appends are
//! conditional on the row not existing, so a redelivered append is a no-op.

use std::sync::Arc;

use curate_common::{EntityId, EntityKind};
use curate_domain::{Aggregate, LifecycleEvent};
use curate_store::{Condition, QueryParams, RecordStore, SortKeyCondition, StoreError};
use tracing::debug;

use crate::error::HistoryError;
use crate::types::{history_pk, StoredEvent};

const READ_PAGE_SIZE: usize = 100;

/// Outcome of an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    Recorded,
    /// A row with this event id was already present.
    AlreadyRecorded,
}

// ---------------------------------------------------------------------------
// EventHistory
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EventHistory {
    store: Arc<dyn RecordStore>,
}

impl EventHistory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Append one applied event to an entity's history.
    pub async fn append<E: LifecycleEvent>(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
        event: &E,
    ) -> Result<Appended, HistoryError> {
        let stored = StoredEvent::from_event(kind, entity_id, event);
        match self
            .store
            .put(stored.to_record(), Some(Condition::NotExists))
            .await
        {
            Ok(()) => Ok(Appended::Recorded),
            Err(StoreError::ConditionFailed { key }) => {
                debug!(%key, event_type = %stored.event_type, "Event already in history");
                Ok(Appended::AlreadyRecorded)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every stored event for one entity, oldest first.
    pub async fn read(
        &self,
        kind: EntityKind,
        entity_id: EntityId,
    ) -> Result<Vec<StoredEvent>, HistoryError> {
        let pk = history_pk(kind, entity_id);
        let mut events = Vec::new();
        let mut start = None;

        loop {
            let page = self
                .store
                .query(QueryParams {
                    index: None,
                    pk: pk.clone(),
                    sk: SortKeyCondition::Any,
                    limit: READ_PAGE_SIZE,
                    start,
                })
                .await?;

            for record in &page.items {
                let event =
                    StoredEvent::from_record(record).map_err(|source| HistoryError::Decode {
                        key: record.key.clone(),
                        source,
                    })?;
                events.push(event);
            }

            match page.last_evaluated {
                Some(cursor) => start = Some(cursor),
                None => break,
            }
        }

        events.sort_by(|a, b| (a.occurred_at, a.event_id).cmp(&(b.occurred_at, b.event_id)));
        Ok(events)
    }

    /// Typed history for one aggregate.
    pub async fn events<A: Aggregate>(&self, entity_id: EntityId) -> Result<Vec<A::Event>, HistoryError> {
        self.read(A::KIND, entity_id)
            .await?
            .iter()
            .map(|stored| {
                stored.decode().map_err(|source| HistoryError::Decode {
                    key: stored.key(),
                    source,
                })
            })
            .collect()
    }

    /// Rebuild an aggregate from its stored history.
    pub async fn replay<A: Aggregate>(&self, entity_id: EntityId) -> Result<A, HistoryError> {
        let events = self.events::<A>(entity_id).await?;
        Ok(A::replay(entity_id, events)?)
    }
}
