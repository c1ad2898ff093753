use curate_repository::RepositoryError;
use curate_store::{Key, StoreError};

/// Why one work item failed. Never aborts its neighbours.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ItemError {
    /// The index entry no longer leads to a primary record. Either the
    /// record is gone or the index has not caught up.
    #[error("index {index} entry {key} does not resolve to a primary record")]
    StaleIndex { index: String, key: Key },

    #[error("primary record {0} does not exist")]
    Missing(Key),

    #[error("no executor registered for job type '{0}'")]
    UnknownJobType(String),

    #[error("could not parse: {0}")]
    Parse(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("job failed: {0}")]
    Job(String),
}

impl From<RepositoryError> for ItemError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Store(e) => ItemError::Store(e.to_string()),
            RepositoryError::Mapping { .. } => ItemError::Parse(e.to_string()),
            RepositoryError::NotFound { kind, id } => {
                ItemError::Missing(curate_repository::dao::primary_key(kind, id))
            }
            other => ItemError::Job(other.to_string()),
        }
    }
}

/// Failures that abort a whole scan page. The scan request stays eligible
/// for redelivery.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("queue rejected {failed} of {total} messages")]
    Enqueue { failed: usize, total: usize },

    #[error("queue error: {0}")]
    Queue(String),

    #[error("invalid scan request: {0}")]
    InvalidRequest(String),
}
