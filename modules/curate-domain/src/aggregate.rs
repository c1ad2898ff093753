//! The contract every curated entity satisfies.

use std::fmt::{Debug, Display};

use curate_common::{EntityId, EntityKind, RowVersion};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::entity::Entity;
use crate::error::TransitionError;
use crate::log::LogEntry;
use crate::meta::EventMeta;

/// Events carry a type string and know how to serialize for the history store.
pub trait LifecycleEvent:
    Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The snake_case event type string (matches the serde tag).
    fn event_type(&self) -> &'static str;

    fn meta(&self) -> &EventMeta;

    /// Whether this event may start a history.
    fn is_genesis(&self) -> bool;

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("event serialization should never fail")
    }
}

/// Result of applying an event: the successor entity, and whether anything a
/// reader could observe actually changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<T> {
    pub entity: T,
    pub effective: bool,
}

/// An event-sourced entity.
///
/// Implementors supply `genesis` (first event) and `evolve` (every later
/// event). `apply_event` and `replay` are derived from those two.
pub trait Aggregate:
    Clone + Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: EntityKind;

    type Event: LifecycleEvent;
    type Status: Copy + Eq + Debug + Display;

    fn id(&self) -> EntityId;

    /// Build a fresh entity from the event that starts its history.
    fn genesis(id: EntityId, event: Self::Event) -> Result<Self, TransitionError>;

    /// Pure state transition. Must reject any event that is not legal in the
    /// current status.
    fn evolve(&self, event: Self::Event) -> Result<Self, TransitionError>;

    /// Derived from the latest applied event.
    fn current_status(&self) -> Self::Status;

    /// Stored/indexed spelling of the current status, e.g. `PUBLISHED`.
    fn status_name(&self) -> &'static str;

    fn last_event(&self) -> &Self::Event;

    fn row_version(&self) -> &RowVersion;

    fn with_row_version(self, row_version: RowVersion) -> Self;

    /// Stable hash of everything a reader could observe, excluding
    /// bookkeeping (row version, modification time, last event identity).
    fn content_digest(&self) -> String;

    /// Audit projection of one of this entity's events.
    fn log_entry(&self, event: &Self::Event) -> LogEntry;

    fn into_entity(self) -> Entity;

    fn from_entity(entity: Entity) -> Option<Self>;

    fn apply_event(&self, event: Self::Event) -> Result<Transition<Self>, TransitionError> {
        let next = self.evolve(event)?;
        let effective = next.content_digest() != self.content_digest();
        Ok(Transition {
            entity: next,
            effective,
        })
    }

    /// Rebuild an entity from its full history, in order.
    fn replay<I>(id: EntityId, events: I) -> Result<Self, TransitionError>
    where
        I: IntoIterator<Item = Self::Event>,
    {
        let mut events = events.into_iter();
        let first = events
            .next()
            .ok_or(TransitionError::EmptyHistory { kind: Self::KIND })?;
        let mut entity = Self::genesis(id, first)?;
        for event in events {
            entity = entity.evolve(event)?;
        }
        Ok(entity)
    }
}

/// SHA-256 over the canonical JSON of a content view.
pub(crate) fn digest_of<T: Serialize>(content: &T) -> String {
    let bytes = serde_json::to_vec(content).expect("content serialization should never fail");
    hex::encode(Sha256::digest(&bytes))
}

pub(crate) fn illegal(kind: EntityKind, status: &'static str, event: &'static str) -> TransitionError {
    TransitionError::IllegalTransition {
        kind,
        status,
        event,
    }
}
