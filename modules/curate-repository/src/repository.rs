//! EntityRepository: version-stamped reads and writes over a `RecordStore`.

use std::sync::Arc;

use curate_common::{attributes, EntityId, EntityKind, RowVersion};
use curate_domain::{Aggregate, Entity, LifecycleEvent, Transition};
use curate_events::EventHistory;
use curate_store::{Condition, Key, Record, RecordStore, StoreError, MAX_BATCH_WRITE_ITEMS};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{BatchWriteConfig, RetryPolicy};
use crate::dao;
use crate::error::RepositoryError;

/// Accounting for one `write_batch` call, merged across chunks and rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchWriteReport {
    /// Items the store confirmed written.
    pub written: usize,
    /// Store submissions, first tries and retries together.
    pub attempts: u32,
    pub consumed_capacity: f64,
    /// Items reported unprocessed, per round (summed over chunks).
    pub unprocessed_per_round: Vec<usize>,
}

impl BatchWriteReport {
    fn merge(&mut self, other: BatchWriteReport) {
        self.written += other.written;
        self.attempts += other.attempts;
        self.consumed_capacity += other.consumed_capacity;
        if self.unprocessed_per_round.len() < other.unprocessed_per_round.len() {
            self.unprocessed_per_round
                .resize(other.unprocessed_per_round.len(), 0);
        }
        for (total, round) in self
            .unprocessed_per_round
            .iter_mut()
            .zip(other.unprocessed_per_round)
        {
            *total += round;
        }
    }
}

struct ChunkOutcome {
    report: BatchWriteReport,
    unwritten: Vec<Key>,
}

// ---------------------------------------------------------------------------
// EntityRepository
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EntityRepository {
    store: Arc<dyn RecordStore>,
    history: Option<EventHistory>,
    batch: BatchWriteConfig,
}

impl EntityRepository {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            history: None,
            batch: BatchWriteConfig::default(),
        }
    }

    /// Record every genesis event stored through `create` and every event
    /// applied through `apply_event`.
    pub fn with_history(mut self, history: EventHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_batch_config(mut self, batch: BatchWriteConfig) -> Self {
        self.batch = batch;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn history(&self) -> Option<&EventHistory> {
        self.history.as_ref()
    }

    // -- Reads ---------------------------------------------------------------

    pub async fn get_record(&self, key: &Key) -> Result<Option<Record>, RepositoryError> {
        Ok(self.store.get(key).await?)
    }

    pub async fn get(&self, kind: EntityKind, id: EntityId) -> Result<Option<Entity>, RepositoryError> {
        match self.store.get(&dao::primary_key(kind, id)).await? {
            Some(record) => Ok(Some(dao::from_record(&record)?)),
            None => Ok(None),
        }
    }

    pub async fn read(&self, kind: EntityKind, id: EntityId) -> Result<Entity, RepositoryError> {
        self.get(kind, id)
            .await?
            .ok_or(RepositoryError::NotFound { kind, id })
    }

    /// Typed read of one aggregate.
    pub async fn read_as<A: Aggregate>(&self, id: EntityId) -> Result<A, RepositoryError> {
        let entity = self.read(A::KIND, id).await?;
        A::from_entity(entity).ok_or_else(|| RepositoryError::Mapping {
            key: dao::primary_key(A::KIND, id),
            reason: format!("stored entity is not a {}", A::KIND),
        })
    }

    // -- Single-entity writes ------------------------------------------------

    /// Store a new entity. Fails if anything already lives under its key.
    ///
    /// The genesis event goes to the history first. It is keyed by event id,
    /// so a retried create never records it twice.
    pub async fn create(&self, entity: impl Into<Entity>) -> Result<Entity, RepositoryError> {
        let entity = entity.into().with_row_version(RowVersion::new());
        if let Some(history) = &self.history {
            let (kind, id) = (entity.kind(), entity.id());
            match &entity {
                Entity::Resource(resource) => history.append(kind, id, resource.last_event()).await?,
                Entity::Ticket(ticket) => history.append(kind, id, ticket.last_event()).await?,
                Entity::File(file) => history.append(kind, id, file.last_event()).await?,
            };
        }

        let record = dao::to_record(&entity);
        match self.store.put(record, Some(Condition::NotExists)).await {
            Ok(()) => Ok(entity),
            Err(StoreError::ConditionFailed { key }) => {
                Err(RepositoryError::ConcurrentModification { key })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read-modify-write conditioned on `entity`'s row version.
    ///
    /// The mutator sees the stored entity. The write carries a fresh row
    /// version and only lands if the stored row version still equals the one
    /// `entity` was read with; otherwise `ConcurrentModification`.
    pub async fn update<F>(&self, entity: &Entity, mutator: F) -> Result<Entity, RepositoryError>
    where
        F: FnOnce(Entity) -> Result<Entity, RepositoryError>,
    {
        let (kind, id) = (entity.kind(), entity.id());
        let key = dao::primary_key(kind, id);
        let expected = entity.row_version().clone();

        let current = self
            .get(kind, id)
            .await?
            .ok_or(RepositoryError::NotFound { kind, id })?;
        if current.row_version() != &expected {
            debug!(%key, "Row version moved before update");
            return Err(RepositoryError::ConcurrentModification { key });
        }

        let next = mutator(current)?;
        if next.kind() != kind || next.id() != id {
            return Err(RepositoryError::Mapping {
                key,
                reason: "mutator changed the entity's identity".into(),
            });
        }

        let next = next.with_row_version(RowVersion::new());
        let condition = Condition::attribute_equals(attributes::ROW_VERSION, expected.as_str());
        match self.store.put(dao::to_record(&next), Some(condition)).await {
            Ok(()) => Ok(next),
            Err(StoreError::ConditionFailed { key }) => {
                debug!(%key, "Lost optimistic-concurrency race");
                Err(RepositoryError::ConcurrentModification { key })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `update` against the latest stored state, re-read and retried on
    /// `ConcurrentModification` up to `policy.max_attempts` times in total.
    pub async fn update_with_retry<F>(
        &self,
        kind: EntityKind,
        id: EntityId,
        policy: &RetryPolicy,
        mut mutator: F,
    ) -> Result<Entity, RepositoryError>
    where
        F: FnMut(Entity) -> Result<Entity, RepositoryError>,
    {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let current = self.read(kind, id).await?;
            match self.update(&current, &mut mutator).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let pause = policy.jitter();
                    warn!(
                        %kind,
                        %id,
                        attempt,
                        jitter_ms = pause.as_millis() as u64,
                        "Concurrent modification, retrying"
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Apply one lifecycle event to a stored aggregate, retrying lost races,
    /// then record it in the event history when one is configured.
    ///
    /// Re-applying an event that is already the aggregate's latest (same
    /// event id) writes nothing and only completes the history append, so a
    /// call that failed after its write can simply be repeated.
    pub async fn apply_event<A: Aggregate>(
        &self,
        id: EntityId,
        event: A::Event,
        policy: &RetryPolicy,
    ) -> Result<Transition<A>, RepositoryError> {
        let current = self.read_as::<A>(id).await?;
        if current.last_event().meta().event_id == event.meta().event_id {
            debug!(kind = %A::KIND, %id, event_type = event.event_type(), "Event already applied");
            if let Some(history) = &self.history {
                history.append(A::KIND, id, &event).await?;
            }
            return Ok(Transition {
                entity: current,
                effective: false,
            });
        }

        let mut effective = false;
        let stored = self
            .update_with_retry(A::KIND, id, policy, |entity| {
                let aggregate = A::from_entity(entity).ok_or_else(|| RepositoryError::Mapping {
                    key: dao::primary_key(A::KIND, id),
                    reason: format!("stored entity is not a {}", A::KIND),
                })?;
                let transition = aggregate.apply_event(event.clone())?;
                effective = transition.effective;
                Ok(transition.entity.into_entity())
            })
            .await?;

        if let Some(history) = &self.history {
            history.append(A::KIND, id, &event).await?;
        }

        let entity = A::from_entity(stored).ok_or_else(|| RepositoryError::Mapping {
            key: dao::primary_key(A::KIND, id),
            reason: format!("stored entity is not a {}", A::KIND),
        })?;
        Ok(Transition { entity, effective })
    }

    // -- Bulk writes ---------------------------------------------------------

    /// Bulk import. Every entity gets a fresh row version.
    pub async fn write_batch(&self, entities: Vec<Entity>) -> Result<BatchWriteReport, RepositoryError> {
        let records = entities
            .into_iter()
            .map(|entity| dao::to_record(&entity.with_row_version(RowVersion::new())))
            .collect();
        self.write_records(records).await
    }

    /// Chunk to the store's batch limit, submit chunks concurrently, and retry
    /// each chunk's unprocessed items sequentially.
    pub async fn write_records(&self, records: Vec<Record>) -> Result<BatchWriteReport, RepositoryError> {
        let chunk_size = self.batch.chunk_size.clamp(1, MAX_BATCH_WRITE_ITEMS);
        let total = records.len();

        let mut chunks = Vec::new();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            chunks.push(records.by_ref().take(chunk_size).collect::<Vec<_>>());
        }

        let outcomes: Vec<ChunkOutcome> = stream::iter(chunks)
            .map(|chunk| self.write_chunk(chunk))
            .buffer_unordered(self.batch.concurrency.max(1))
            .collect()
            .await;

        let mut report = BatchWriteReport::default();
        let mut unwritten = Vec::new();
        for outcome in outcomes {
            report.merge(outcome.report);
            unwritten.extend(outcome.unwritten);
        }

        if !unwritten.is_empty() {
            unwritten.sort();
            warn!(
                total,
                written = report.written,
                attempts = report.attempts,
                unwritten = unwritten.len(),
                "Batch write left items unwritten"
            );
            return Err(RepositoryError::BatchInsertionFailure { unwritten });
        }

        info!(
            written = report.written,
            attempts = report.attempts,
            consumed_capacity = report.consumed_capacity,
            "Batch write complete"
        );
        Ok(report)
    }

    /// A store error ends the chunk; whatever it had not written yet is
    /// reported unwritten alongside the rounds that did land.
    async fn write_chunk(&self, chunk: Vec<Record>) -> ChunkOutcome {
        let max_attempts = self.batch.max_attempts.max(1);
        let mut report = BatchWriteReport::default();
        let mut pending = chunk;

        for attempt in 1..=max_attempts {
            let submitted = pending.len();
            let keys: Vec<Key> = pending.iter().map(|record| record.key.clone()).collect();
            let output = match self.store.batch_write(pending).await {
                Ok(output) => output,
                Err(e) => {
                    warn!(attempt, items = submitted, error = %e, "Batch write chunk failed");
                    return ChunkOutcome {
                        report,
                        unwritten: keys,
                    };
                }
            };
            let unprocessed = output.unprocessed.len();

            report.attempts += 1;
            report.written += submitted - unprocessed;
            report.consumed_capacity += output.consumed_capacity;
            report.unprocessed_per_round.push(unprocessed);
            pending = output.unprocessed;

            if pending.is_empty() {
                break;
            }
            if attempt < max_attempts {
                let pause = self.batch.backoff * attempt;
                warn!(
                    attempt,
                    unprocessed,
                    backoff_ms = pause.as_millis() as u64,
                    "Unprocessed items in batch write, retrying"
                );
                tokio::time::sleep(pause).await;
            }
        }

        ChunkOutcome {
            report,
            unwritten: pending.into_iter().map(|record| record.key).collect(),
        }
    }
}
