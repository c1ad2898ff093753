use curate_common::EntityKind;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The record's `entity_type` is missing or not one the router knows.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("old record is a {old} but new record is a {new}")]
    EntityKindMismatch { old: EntityKind, new: EntityKind },

    #[error("neither an old nor a new record to classify")]
    NothingToClassify,

    #[error("publishing to {topic} failed: {reason}")]
    Publish {
        topic: crate::types::Topic,
        reason: String,
    },
}
