//! Audit log projection of lifecycle events.
//!
//! Side-effect free. Every field beyond topic/timestamp/event id is optional
//! and omitted when absent, so a projection can never fail on missing data.

use chrono::{DateTime, Utc};
use curate_common::{EntityId, EventId};
use serde::{Deserialize, Serialize};

use crate::meta::EventMeta;
use crate::types::ImportSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogTopic {
    ResourceCreated,
    ResourceCreatedByThirdParty,
    ResourcePublished,
    ResourceRepublished,
    ResourceUnpublished,
    ResourceDeleted,
    DoiReserved,
    ResourceImported,
    ResourceMerged,
    DoiRequested,
    DoiAssigned,
    DoiRejected,
    FileUploaded,
    FileApproved,
    FileRejected,
    FileRetracted,
    FileHidden,
    FileDeleted,
    FileImported,
    FileTypeUpdatedByImport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub topic: LogTopic,
    pub timestamp: DateTime<Utc>,
    pub event_id: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_source: Option<ImportSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

impl LogEntry {
    pub(crate) fn from_meta(topic: LogTopic, meta: &EventMeta) -> Self {
        Self {
            topic,
            timestamp: meta.occurred_at,
            event_id: meta.event_id,
            resource_id: None,
            ticket_id: None,
            file_id: None,
            performed_by: meta.actor.clone(),
            institution: meta.institution.clone(),
            import_source: None,
            filename: None,
            doi: None,
        }
    }

    pub(crate) fn resource(mut self, id: EntityId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub(crate) fn ticket(mut self, id: EntityId) -> Self {
        self.ticket_id = Some(id);
        self
    }

    pub(crate) fn file(mut self, id: EntityId) -> Self {
        self.file_id = Some(id);
        self
    }

    pub(crate) fn import_source(mut self, source: Option<&ImportSource>) -> Self {
        self.import_source = source.cloned();
        self
    }

    pub(crate) fn filename(mut self, filename: Option<&str>) -> Self {
        self.filename = filename.map(str::to_string);
        self
    }

    pub(crate) fn doi(mut self, doi: Option<&str>) -> Self {
        self.doi = doi.map(str::to_string);
        self
    }
}
