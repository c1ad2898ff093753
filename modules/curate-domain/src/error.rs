use curate_common::EntityKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Illegal transition: {kind} in status {status} cannot accept {event}")]
    IllegalTransition {
        kind: EntityKind,
        status: &'static str,
        event: &'static str,
    },

    #[error("{event} cannot start a {kind} history")]
    NotAGenesisEvent {
        kind: EntityKind,
        event: &'static str,
    },

    #[error("Cannot replay an empty {kind} history")]
    EmptyHistory { kind: EntityKind },

    #[error("Invalid {event} payload for {kind}: {reason}")]
    InvalidPayload {
        kind: EntityKind,
        event: &'static str,
        reason: String,
    },
}
