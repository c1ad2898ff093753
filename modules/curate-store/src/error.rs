use thiserror::Error;

use crate::types::Key;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Condition failed for {key}")]
    ConditionFailed { key: Key },

    #[error("Batch of {size} items exceeds the store maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Cursor does not belong to this scan: {0}")]
    InvalidCursor(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_condition_failed(&self) -> bool {
        matches!(self, StoreError::ConditionFailed { .. })
    }
}
