use curate_domain::TransitionError;
use curate_store::{Key, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("history row {key} could not be decoded: {source}")]
    Decode {
        key: Key,
        #[source]
        source: serde_json::Error,
    },

    #[error("history does not replay: {0}")]
    Replay(#[from] TransitionError),
}
