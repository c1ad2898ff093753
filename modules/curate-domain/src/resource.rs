//! Resources: curated metadata records.

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
use crate::types::{ImportSource, Owner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Draft,
    Published,
    Unpublished,
    Deleted,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Draft => "DRAFT",
            ResourceStatus::Published => "PUBLISHED",
            ResourceStatus::Unpublished => "UNPUBLISHED",
            ResourceStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Initial content carried by the events that start a resource history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewResource {
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
}

impl NewResource {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            title: None,
            publication_year: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceEvent {
    Created {
        meta: EventMeta,
        resource: NewResource,
    },

    /// Created through an integration client rather than by a person.
    CreatedByThirdParty {
        meta: EventMeta,
        resource: NewResource,
        client: String,
    },

    Published {
        meta: EventMeta,
    },

    /// Only legal after `Unpublished`.
    Republished {
        meta: EventMeta,
    },

    Unpublished {
        meta: EventMeta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duplicate_of: Option<EntityId>,
    },

    /// Tombstone. Terminal.
    Deleted {
        meta: EventMeta,
    },

    DoiReserved {
        meta: EventMeta,
        doi: String,
    },

    /// Starts a history from an external bibliographic source. Lands published.
    Imported {
        meta: EventMeta,
        resource: NewResource,
        source: ImportSource,
    },

    /// Import data merged into an already published resource.
    Merged {
        meta: EventMeta,
        source: ImportSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
}

impl ResourceEvent {
    /// The status a resource is in right after this event.
    pub fn status(&self) -> ResourceStatus {
        match self {
            ResourceEvent::Created { .. }
            | ResourceEvent::CreatedByThirdParty { .. }
            | ResourceEvent::DoiReserved { .. } => ResourceStatus::Draft,
            ResourceEvent::Published { .. }
            | ResourceEvent::Republished { .. }
            | ResourceEvent::Imported { .. }
            | ResourceEvent::Merged { .. } => ResourceStatus::Published,
            ResourceEvent::Unpublished { .. } => ResourceStatus::Unpublished,
            ResourceEvent::Deleted { .. } => ResourceStatus::Deleted,
        }
    }

    pub fn to_log_entry(&self, resource_id: EntityId) -> LogEntry {
        let topic = match self {
            ResourceEvent::Created { .. } => LogTopic::ResourceCreated,
            ResourceEvent::CreatedByThirdParty { .. } => LogTopic::ResourceCreatedByThirdParty,
            ResourceEvent::Published { .. } => LogTopic::ResourcePublished,
            ResourceEvent::Republished { .. } => LogTopic::ResourceRepublished,
            ResourceEvent::Unpublished { .. } => LogTopic::ResourceUnpublished,
            ResourceEvent::Deleted { .. } => LogTopic::ResourceDeleted,
            ResourceEvent::DoiReserved { .. } => LogTopic::DoiReserved,
            ResourceEvent::Imported { .. } => LogTopic::ResourceImported,
            ResourceEvent::Merged { .. } => LogTopic::ResourceMerged,
        };
        let entry = LogEntry::from_meta(topic, self.meta()).resource(resource_id);

        match self {
            ResourceEvent::Imported { source, .. } | ResourceEvent::Merged { source, .. } => {
                entry.import_source(Some(source))
            }
            ResourceEvent::DoiReserved { doi, .. } => entry.doi(Some(doi)),
            ResourceEvent::CreatedByThirdParty { client, .. } if entry.performed_by.is_none() => {
                LogEntry {
                    performed_by: Some(client.clone()),
                    ..entry
                }
            }
            _ => entry,
        }
    }
}

impl LifecycleEvent for ResourceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResourceEvent::Created { .. } => "created",
            ResourceEvent::CreatedByThirdParty { .. } => "created_by_third_party",
            ResourceEvent::Published { .. } => "published",
            ResourceEvent::Republished { .. } => "republished",
            ResourceEvent::Unpublished { .. } => "unpublished",
            ResourceEvent::Deleted { .. } => "deleted",
            ResourceEvent::DoiReserved { .. } => "doi_reserved",
            ResourceEvent::Imported { .. } => "imported",
            ResourceEvent::Merged { .. } => "merged",
        }
    }

    fn meta(&self) -> &EventMeta {
        match self {
            ResourceEvent::Created { meta, .. }
            | ResourceEvent::CreatedByThirdParty { meta, .. }
            | ResourceEvent::Published { meta }
            | ResourceEvent::Republished { meta }
            | ResourceEvent::Unpublished { meta, .. }
            | ResourceEvent::Deleted { meta }
            | ResourceEvent::DoiReserved { meta, .. }
            | ResourceEvent::Imported { meta, .. }
            | ResourceEvent::Merged { meta, .. } => meta,
        }
    }

    fn is_genesis(&self) -> bool {
        matches!(
            self,
            ResourceEvent::Created { .. }
                | ResourceEvent::CreatedByThirdParty { .. }
                | ResourceEvent::Imported { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: EntityId,
    pub owner: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_sources: Vec<ImportSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<EntityId>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    last_event: ResourceEvent,
    row_version: RowVersion,
}

impl Resource {
    /// Start a new draft owned by `resource.owner`.
    pub fn create(resource: NewResource, meta: EventMeta) -> Self {
        let at = meta.occurred_at;
        Self {
            id: EntityId::new(),
            owner: resource.owner.clone(),
            title: resource.title.clone(),
            publication_year: resource.publication_year,
            doi: None,
            import_sources: Vec::new(),
            duplicate_of: None,
            created_date: at,
            modified_date: at,
            published_date: None,
            last_event: ResourceEvent::Created { meta, resource },
            row_version: RowVersion::new(),
        }
    }

    /// Everything except `row_version`.
    fn versionless(&self) -> impl PartialEq + Hash + '_ {
        let Self {
            id,
            owner,
            title,
            publication_year,
            doi,
            import_sources,
            duplicate_of,
            created_date,
            modified_date,
            published_date,
            last_event,
            row_version: _,
        } = self;
        (
            id,
            owner,
            title,
            publication_year,
            doi,
            import_sources,
            duplicate_of,
            created_date,
            modified_date,
            published_date,
            last_event,
        )
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.versionless() == other.versionless()
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.versionless().hash(state);
    }
}

#[derive(Serialize)]
struct ResourceContent<'a> {
    id: &'a EntityId,
    status: ResourceStatus,
    owner: &'a Owner,
    title: &'a Option<String>,
    publication_year: Option<i32>,
    doi: &'a Option<String>,
    import_sources: &'a [ImportSource],
    duplicate_of: Option<EntityId>,
    created_date: &'a DateTime<Utc>,
    published_date: Option<DateTime<Utc>>,
}

impl Aggregate for Resource {
    const KIND: EntityKind = EntityKind::Resource;

    type Event = ResourceEvent;
    type Status = ResourceStatus;

    fn id(&self) -> EntityId {
        self.id
    }

    fn genesis(id: EntityId, event: ResourceEvent) -> Result<Self, TransitionError> {
        let (resource, source) = match &event {
            ResourceEvent::Created { resource, .. }
            | ResourceEvent::CreatedByThirdParty { resource, .. } => (resource.clone(), None),
            ResourceEvent::Imported {
                resource, source, ..
            } => (resource.clone(), Some(source.clone())),
            other => {
                return Err(TransitionError::NotAGenesisEvent {
                    kind: Self::KIND,
                    event: other.event_type(),
                })
            }
        };

        let at = event.meta().occurred_at;
        let published_date = source.as_ref().map(|_| at);
        Ok(Self {
            id,
            owner: resource.owner,
            title: resource.title,
            publication_year: resource.publication_year,
            doi: None,
            import_sources: source.into_iter().collect(),
            duplicate_of: None,
            created_date: at,
            modified_date: at,
            published_date,
            last_event: event,
            row_version: RowVersion::new(),
        })
    }

    fn evolve(&self, event: ResourceEvent) -> Result<Self, TransitionError> {
        use ResourceStatus::*;

        let status = self.current_status();
        let at = event.meta().occurred_at;
        let mut next = self.clone();

        match (&event, status) {
            (ResourceEvent::Published { .. }, Draft) => {
                next.published_date = Some(at);
            }
            (ResourceEvent::DoiReserved { doi, .. }, Draft) => {
                next.doi = Some(doi.clone());
            }
            (ResourceEvent::Unpublished { duplicate_of, .. }, Published) => {
                next.duplicate_of = *duplicate_of;
            }
            (ResourceEvent::Merged { source, title, .. }, Published) => {
                if !next.import_sources.contains(source) {
                    next.import_sources.push(source.clone());
                }
                if let Some(title) = title {
                    next.title = Some(title.clone());
                }
            }
            (ResourceEvent::Republished { .. }, Unpublished) => {
                next.duplicate_of = None;
            }
            (ResourceEvent::Deleted { .. }, Draft | Published | Unpublished) => {}
            _ => return Err(illegal(Self::KIND, status.as_str(), event.event_type())),
        }

        next.modified_date = at;
        next.last_event = event;
        Ok(next)
    }

    fn current_status(&self) -> ResourceStatus {
        self.last_event.status()
    }

    fn status_name(&self) -> &'static str {
        self.current_status().as_str()
    }

    fn last_event(&self) -> &ResourceEvent {
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
        digest_of(&ResourceContent {
            id: &self.id,
            status: self.current_status(),
            owner: &self.owner,
            title: &self.title,
            publication_year: self.publication_year,
            doi: &self.doi,
            import_sources: &self.import_sources,
            duplicate_of: self.duplicate_of,
            created_date: &self.created_date,
            published_date: self.published_date,
        })
    }

    fn log_entry(&self, event: &ResourceEvent) -> LogEntry {
        event.to_log_entry(self.id)
    }

    fn into_entity(self) -> Entity {
        Entity::Resource(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::Resource(resource) => Some(resource),
            _ => None,
        }
    }
}
