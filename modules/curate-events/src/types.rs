//! Core types for the event history. Variant-agnostic.

use chrono::{DateTime, Utc};
use curate_common::{EntityId, EntityKind, EventId};
use curate_domain::LifecycleEvent;
use curate_store::{Key, Record};
use serde::{Deserialize, Serialize};

/// Partition key shared by every history row of one entity.
pub fn history_pk(kind: EntityKind, entity_id: EntityId) -> String {
    format!("History:{kind}:{entity_id}")
}

/// An event as stored in the history table. Returned by all read methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub entity_kind: EntityKind,
    pub entity_id: EntityId,
    pub event_id: EventId,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub payload: serde_json::Value,
}

impl StoredEvent {
    /// Capture an event for appending. Identity and timestamp come from the
    /// event's own metadata, so re-appending the same event targets the same row.
    pub fn from_event<E: LifecycleEvent>(kind: EntityKind, entity_id: EntityId, event: &E) -> Self {
        let meta = event.meta();
        Self {
            entity_kind: kind,
            entity_id,
            event_id: meta.event_id,
            event_type: event.event_type().to_string(),
            occurred_at: meta.occurred_at,
            actor: meta.actor.clone(),
            payload: event.to_payload(),
        }
    }

    /// Deserialize the payload back into its typed event.
    pub fn decode<E: LifecycleEvent>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }

    pub fn key(&self) -> Key {
        Key::new(
            history_pk(self.entity_kind, self.entity_id),
            self.event_id.to_string(),
        )
    }

    pub(crate) fn to_record(&self) -> Record {
        let data = serde_json::to_value(self).expect("StoredEvent serialization should never fail");
        Record::new(self.key(), data)
            .with_attribute(curate_common::attributes::ENTITY_TYPE, self.entity_kind.as_str())
    }

    pub(crate) fn from_record(record: &Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record.data.clone())
    }
}
