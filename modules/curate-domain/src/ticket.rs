//! DOI request tickets attached to a resource.

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use curate_common::{EntityId, EntityKind, RowVersion};
use serde::{Deserialize, Serialize};

use crate::aggregate::{digest_of, illegal, Aggregate, LifecycleEvent};
use crate::entity::Entity;
use crate::error::TransitionError;
use crate::log::{LogEntry, LogTopic};
use crate::meta::EventMeta;
use crate::types::Owner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Pending,
    Completed,
    NotApplicable,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Completed => "COMPLETED",
            TicketStatus::NotApplicable => "NOT_APPLICABLE",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketEvent {
    DoiRequested {
        meta: EventMeta,
        resource_id: EntityId,
        owner: Owner,
    },

    DoiAssigned {
        meta: EventMeta,
        doi: String,
    },

    DoiRejected {
        meta: EventMeta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl TicketEvent {
    pub fn status(&self) -> TicketStatus {
        match self {
            TicketEvent::DoiRequested { .. } => TicketStatus::Pending,
            TicketEvent::DoiAssigned { .. } => TicketStatus::Completed,
            TicketEvent::DoiRejected { .. } => TicketStatus::NotApplicable,
        }
    }

    pub fn to_log_entry(&self, ticket_id: EntityId, resource_id: EntityId) -> LogEntry {
        let topic = match self {
            TicketEvent::DoiRequested { .. } => LogTopic::DoiRequested,
            TicketEvent::DoiAssigned { .. } => LogTopic::DoiAssigned,
            TicketEvent::DoiRejected { .. } => LogTopic::DoiRejected,
        };
        let entry = LogEntry::from_meta(topic, self.meta())
            .ticket(ticket_id)
            .resource(resource_id);

        match self {
            TicketEvent::DoiAssigned { doi, .. } => entry.doi(Some(doi)),
            _ => entry,
        }
    }
}

impl LifecycleEvent for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TicketEvent::DoiRequested { .. } => "doi_requested",
            TicketEvent::DoiAssigned { .. } => "doi_assigned",
            TicketEvent::DoiRejected { .. } => "doi_rejected",
        }
    }

    fn meta(&self) -> &EventMeta {
        match self {
            TicketEvent::DoiRequested { meta, .. }
            | TicketEvent::DoiAssigned { meta, .. }
            | TicketEvent::DoiRejected { meta, .. } => meta,
        }
    }

    fn is_genesis(&self) -> bool {
        matches!(self, TicketEvent::DoiRequested { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: EntityId,
    pub resource_id: EntityId,
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    last_event: TicketEvent,
    row_version: RowVersion,
}

impl Ticket {
    pub fn request_doi(resource_id: EntityId, owner: Owner, meta: EventMeta) -> Self {
        let at = meta.occurred_at;
        Self {
            id: EntityId::new(),
            resource_id,
            owner: owner.clone(),
            doi: None,
            rejection_reason: None,
            created_date: at,
            modified_date: at,
            last_event: TicketEvent::DoiRequested {
                meta,
                resource_id,
                owner,
            },
            row_version: RowVersion::new(),
        }
    }

    fn versionless(&self) -> impl PartialEq + Hash + '_ {
        let Self {
            id,
            resource_id,
            owner,
            doi,
            rejection_reason,
            created_date,
            modified_date,
            last_event,
            row_version: _,
        } = self;
        (
            id,
            resource_id,
            owner,
            doi,
            rejection_reason,
            created_date,
            modified_date,
            last_event,
        )
    }
}

impl PartialEq for Ticket {
    fn eq(&self, other: &Self) -> bool {
        self.versionless() == other.versionless()
    }
}

impl Eq for Ticket {}

impl Hash for Ticket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.versionless().hash(state);
    }
}

#[derive(Serialize)]
struct TicketContent<'a> {
    id: &'a EntityId,
    status: TicketStatus,
    resource_id: &'a EntityId,
    owner: &'a Owner,
    doi: &'a Option<String>,
    rejection_reason: &'a Option<String>,
    created_date: &'a DateTime<Utc>,
}

impl Aggregate for Ticket {
    const KIND: EntityKind = EntityKind::Ticket;

    type Event = TicketEvent;
    type Status = TicketStatus;

    fn id(&self) -> EntityId {
        self.id
    }

    fn genesis(id: EntityId, event: TicketEvent) -> Result<Self, TransitionError> {
        let TicketEvent::DoiRequested {
            meta,
            resource_id,
            owner,
        } = &event
        else {
            return Err(TransitionError::NotAGenesisEvent {
                kind: Self::KIND,
                event: event.event_type(),
            });
        };

        Ok(Self {
            id,
            resource_id: *resource_id,
            owner: owner.clone(),
            doi: None,
            rejection_reason: None,
            created_date: meta.occurred_at,
            modified_date: meta.occurred_at,
            last_event: event.clone(),
            row_version: RowVersion::new(),
        })
    }

    fn evolve(&self, event: TicketEvent) -> Result<Self, TransitionError> {
        let status = self.current_status();
        let mut next = self.clone();

        match (&event, status) {
            (TicketEvent::DoiAssigned { doi, .. }, TicketStatus::Pending) => {
                next.doi = Some(doi.clone());
            }
            (TicketEvent::DoiRejected { reason, .. }, TicketStatus::Pending) => {
                next.rejection_reason = reason.clone();
            }
            _ => return Err(illegal(Self::KIND, status.as_str(), event.event_type())),
        }

        next.modified_date = event.meta().occurred_at;
        next.last_event = event;
        Ok(next)
    }

    fn current_status(&self) -> TicketStatus {
        self.last_event.status()
    }

    fn status_name(&self) -> &'static str {
        self.current_status().as_str()
    }

    fn last_event(&self) -> &TicketEvent {
        &self.last_event
    }

    fn row_version(&self) -> &RowVersion {
        &self.row_version
    }

    fn with_row_version(mut self, row_version: RowVersion) -> Self {
        self.row_version = row_version;
        self
    }

    fn content_digest(&self) -> String {
        digest_of(&TicketContent {
            id: &self.id,
            status: self.current_status(),
            resource_id: &self.resource_id,
            owner: &self.owner,
            doi: &self.doi,
            rejection_reason: &self.rejection_reason,
            created_date: &self.created_date,
        })
    }

    fn log_entry(&self, event: &TicketEvent) -> LogEntry {
        event.to_log_entry(self.id, self.resource_id)
    }

    fn into_entity(self) -> Entity {
        Entity::Ticket(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Ticket(ticket) => Some(ticket),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Ticket {
        Ticket::request_doi(
            EntityId::new(),
            Owner::new("bob@194", "https://org.example/194.0.0.0"),
            EventMeta::by("bob@194"),
        )
    }

    #[test]
    fn assigned_ticket_is_completed_and_terminal() {
        let completed = pending()
            .apply_event(TicketEvent::DoiAssigned {
                meta: EventMeta::by("curator@194"),
                doi: "10.1000/abc".into(),
            })
            .unwrap()
            .entity;
        assert_eq!(completed.current_status(), TicketStatus::Completed);
        assert_eq!(completed.doi.as_deref(), Some("10.1000/abc"));

        let err = completed
            .apply_event(TicketEvent::DoiRejected {
                meta: EventMeta::now(),
                reason: None,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::IllegalTransition {
                status: "COMPLETED",
                ..
            }
        ));
    }

    #[test]
    fn rejected_ticket_keeps_reason() {
        let rejected = pending()
            .apply_event(TicketEvent::DoiRejected {
                meta: EventMeta::now(),
                reason: Some("not eligible".into()),
            })
            .unwrap()
            .entity;
        assert_eq!(rejected.current_status(), TicketStatus::NotApplicable);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("not eligible"));
    }

    #[test]
    fn log_entry_references_ticket_and_resource() {
        let ticket = pending();
        let entry = ticket.log_entry(ticket.last_event());
        assert_eq!(entry.topic, LogTopic::DoiRequested);
        assert_eq!(entry.ticket_id, Some(ticket.id));
        assert_eq!(entry.resource_id, Some(ticket.resource_id));
        assert_eq!(entry.performed_by.as_deref(), Some("bob@194"));
    }
}
