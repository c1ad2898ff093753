use curate_common::{EntityId, EntityKind};
use curate_domain::TransitionError;
use curate_events::HistoryError;
use curate_store::{Key, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Another writer changed the record since it was read. Retryable.
    #[error("concurrent modification of {key}")]
    ConcurrentModification { key: Key },

    /// Bulk write gave up. Names every item still unwritten.
    #[error("batch write exhausted retries with {} unwritten: {}", unwritten.len(), key_list(unwritten))]
    BatchInsertionFailure { unwritten: Vec<Key> },

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record {key} does not map to an entity: {reason}")]
    Mapping { key: Key, reason: String },

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl RepositoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RepositoryError::ConcurrentModification { .. })
    }
}

fn key_list(keys: &[Key]) -> String {
    keys.iter()
        .map(Key::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
