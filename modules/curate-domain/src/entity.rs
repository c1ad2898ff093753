//! Closed union over every entity kind. This is the shape persisted in a
//! record's data blob; the `entity_type` tag selects the variant.

use curate_common::{EntityId, EntityKind, RowVersion};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::file::FileEntry;
use crate::resource::Resource;
use crate::ticket::Ticket;
use crate::types::Owner;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_type")]
pub enum Entity {
    Resource(Resource),
    Ticket(Ticket),
    File(FileEntry),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Resource(_) => EntityKind::Resource,
            Entity::Ticket(_) => EntityKind::Ticket,
            Entity::File(_) => EntityKind::File,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Entity::Resource(r) => r.id(),
            Entity::Ticket(t) => t.id(),
            Entity::File(f) => f.id(),
        }
    }

    pub fn status_name(&self) -> &'static str {
        match self {
            Entity::Resource(r) => r.status_name(),
            Entity::Ticket(t) => t.status_name(),
            Entity::File(f) => f.status_name(),
        }
    }

    pub fn row_version(&self) -> &RowVersion {
        match self {
            Entity::Resource(r) => r.row_version(),
            Entity::Ticket(t) => t.row_version(),
            Entity::File(f) => f.row_version(),
        }
    }

    pub fn with_row_version(self, row_version: RowVersion) -> Self {
        match self {
            Entity::Resource(r) => Entity::Resource(r.with_row_version(row_version)),
            Entity::Ticket(t) => Entity::Ticket(t.with_row_version(row_version)),
            Entity::File(f) => Entity::File(f.with_row_version(row_version)),
        }
    }

    pub fn content_digest(&self) -> String {
        match self {
            Entity::Resource(r) => r.content_digest(),
            Entity::Ticket(t) => t.content_digest(),
            Entity::File(f) => f.content_digest(),
        }
    }

    /// The owner every entity kind carries.
    pub fn owner(&self) -> &Owner {
        match self {
            Entity::Resource(r) => &r.owner,
            Entity::Ticket(t) => &t.owner,
            Entity::File(f) => &f.owner,
        }
    }

    /// Ownership is plain data, not lifecycle state, so maintenance jobs may
    /// rewrite it without an event.
    pub fn owner_mut(&mut self) -> &mut Owner {
        match self {
            Entity::Resource(r) => &mut r.owner,
            Entity::Ticket(t) => &mut t.owner,
            Entity::File(f) => &mut f.owner,
        }
    }

    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("Entity serialization should never fail")
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

impl From<Resource> for Entity {
    fn from(resource: Resource) -> Self {
        Entity::Resource(resource)
    }
}

impl From<Ticket> for Entity {
    fn from(ticket: Ticket) -> Self {
        Entity::Ticket(ticket)
    }
}

impl From<FileEntry> for Entity {
    fn from(file: FileEntry) -> Self {
        Entity::File(file)
    }
}
