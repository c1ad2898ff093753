//! Files attached to a resource. The file's status doubles as its type:
//! pending review, approved (open), rejected, hidden, or deleted.

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
pub enum FileStatus {
    Pending,
    Approved,
    Rejected,
    Hidden,
    Deleted,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Pending => "PENDING",
            FileStatus::Approved => "APPROVED",
            FileStatus::Rejected => "REJECTED",
            FileStatus::Hidden => "HIDDEN",
            FileStatus::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewFile {
    pub resource_id: EntityId,
    pub owner: Owner,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileEvent {
    Uploaded {
        meta: EventMeta,
        file: NewFile,
    },

    Approved {
        meta: EventMeta,
    },

    Rejected {
        meta: EventMeta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Approval withdrawn; the file goes back to review.
    Retracted {
        meta: EventMeta,
    },

    Hidden {
        meta: EventMeta,
    },

    Deleted {
        meta: EventMeta,
    },

    Imported {
        meta: EventMeta,
        file: NewFile,
        source: ImportSource,
    },

    /// An import run reclassified the file. Carries the new status.
    TypeUpdatedByImport {
        meta: EventMeta,
        status: FileStatus,
        source: ImportSource,
    },
}

impl FileEvent {
    pub fn status(&self) -> FileStatus {
        match self {
            FileEvent::Uploaded { .. } | FileEvent::Retracted { .. } => FileStatus::Pending,
            FileEvent::Approved { .. } | FileEvent::Imported { .. } => FileStatus::Approved,
            FileEvent::Rejected { .. } => FileStatus::Rejected,
            FileEvent::Hidden { .. } => FileStatus::Hidden,
            FileEvent::Deleted { .. } => FileStatus::Deleted,
            FileEvent::TypeUpdatedByImport { status, .. } => *status,
        }
    }

    pub fn to_log_entry(
        &self,
        file_id: EntityId,
        resource_id: EntityId,
        filename: Option<&str>,
    ) -> LogEntry {
        let topic = match self {
            FileEvent::Uploaded { .. } => LogTopic::FileUploaded,
            FileEvent::Approved { .. } => LogTopic::FileApproved,
            FileEvent::Rejected { .. } => LogTopic::FileRejected,
            FileEvent::Retracted { .. } => LogTopic::FileRetracted,
            FileEvent::Hidden { .. } => LogTopic::FileHidden,
            FileEvent::Deleted { .. } => LogTopic::FileDeleted,
            FileEvent::Imported { .. } => LogTopic::FileImported,
            FileEvent::TypeUpdatedByImport { .. } => LogTopic::FileTypeUpdatedByImport,
        };
        let source = match self {
            FileEvent::Imported { source, .. } | FileEvent::TypeUpdatedByImport { source, .. } => {
                Some(source)
            }
            _ => None,
        };

        LogEntry::from_meta(topic, self.meta())
            .file(file_id)
            .resource(resource_id)
            .filename(filename)
            .import_source(source)
    }
}

impl LifecycleEvent for FileEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FileEvent::Uploaded { .. } => "uploaded",
            FileEvent::Approved { .. } => "approved",
            FileEvent::Rejected { .. } => "rejected",
            FileEvent::Retracted { .. } => "retracted",
            FileEvent::Hidden { .. } => "hidden",
            FileEvent::Deleted { .. } => "deleted",
            FileEvent::Imported { .. } => "imported",
            FileEvent::TypeUpdatedByImport { .. } => "type_updated_by_import",
        }
    }

    fn meta(&self) -> &EventMeta {
        match self {
            FileEvent::Uploaded { meta, .. }
            | FileEvent::Approved { meta }
            | FileEvent::Rejected { meta, .. }
            | FileEvent::Retracted { meta }
            | FileEvent::Hidden { meta }
            | FileEvent::Deleted { meta }
            | FileEvent::Imported { meta, .. }
            | FileEvent::TypeUpdatedByImport { meta, .. } => meta,
        }
    }

    fn is_genesis(&self) -> bool {
        matches!(self, FileEvent::Uploaded { .. } | FileEvent::Imported { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: EntityId,
    pub resource_id: EntityId,
    pub owner: Owner,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_source: Option<ImportSource>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    last_event: FileEvent,
    row_version: RowVersion,
}

impl FileEntry {
    pub fn upload(file: NewFile, meta: EventMeta) -> Self {
        let at = meta.occurred_at;
        Self {
            id: EntityId::new(),
            resource_id: file.resource_id,
            owner: file.owner.clone(),
            name: file.name.clone(),
            rejection_reason: None,
            import_source: None,
            created_date: at,
            modified_date: at,
            last_event: FileEvent::Uploaded { meta, file },
            row_version: RowVersion::new(),
        }
    }

    fn versionless(&self) -> impl PartialEq + Hash + '_ {
        let Self {
            id,
            resource_id,
            owner,
            name,
            rejection_reason,
            import_source,
            created_date,
            modified_date,
            last_event,
            row_version: _,
        } = self;
        (
            id,
            resource_id,
            owner,
            name,
            rejection_reason,
            import_source,
            created_date,
            modified_date,
            last_event,
        )
    }
}

impl PartialEq for FileEntry {
    fn eq(&self, other: &Self) -> bool {
        self.versionless() == other.versionless()
    }
}

impl Eq for FileEntry {}

impl Hash for FileEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.versionless().hash(state);
    }
}

#[derive(Serialize)]
struct FileContent<'a> {
    id: &'a EntityId,
    status: FileStatus,
    resource_id: &'a EntityId,
    owner: &'a Owner,
    name: &'a str,
    rejection_reason: &'a Option<String>,
    import_source: &'a Option<ImportSource>,
    created_date: &'a DateTime<Utc>,
}

impl Aggregate for FileEntry {
    const KIND: EntityKind = EntityKind::File;

    type Event = FileEvent;
    type Status = FileStatus;

    fn id(&self) -> EntityId {
        self.id
    }

    fn genesis(id: EntityId, event: FileEvent) -> Result<Self, TransitionError> {
        let (file, source) = match &event {
            FileEvent::Uploaded { file, .. } => (file.clone(), None),
            FileEvent::Imported { file, source, .. } => (file.clone(), Some(source.clone())),
            other => {
                return Err(TransitionError::NotAGenesisEvent {
                    kind: Self::KIND,
                    event: other.event_type(),
                })
            }
        };

        let at = event.meta().occurred_at;
        Ok(Self {
            id,
            resource_id: file.resource_id,
            owner: file.owner,
            name: file.name,
            rejection_reason: None,
            import_source: source,
            created_date: at,
            modified_date: at,
            last_event: event,
            row_version: RowVersion::new(),
        })
    }

    fn evolve(&self, event: FileEvent) -> Result<Self, TransitionError> {
        use FileStatus::*;

        let status = self.current_status();
        let mut next = self.clone();

        match (&event, status) {
            (FileEvent::Approved { .. }, Pending) => {
                next.rejection_reason = None;
            }
            (FileEvent::Rejected { reason, .. }, Pending) => {
                next.rejection_reason = reason.clone();
            }
            (FileEvent::Retracted { .. }, Approved) => {}
            (FileEvent::Hidden { .. }, Pending | Approved | Rejected) => {}
            (FileEvent::Deleted { .. }, Pending | Approved | Rejected | Hidden) => {}
            (
                FileEvent::TypeUpdatedByImport {
                    status: new_status,
                    source,
                    ..
                },
                Pending | Approved | Rejected | Hidden,
            ) => {
                if *new_status == Deleted {
                    return Err(TransitionError::InvalidPayload {
                        kind: Self::KIND,
                        event: event.event_type(),
                        reason: "an import cannot delete a file".into(),
                    });
                }
                next.import_source = Some(source.clone());
            }
            _ => return Err(illegal(Self::KIND, status.as_str(), event.event_type())),
        }

        next.modified_date = event.meta().occurred_at;
        next.last_event = event;
        Ok(next)
    }

    fn current_status(&self) -> FileStatus {
        self.last_event.status()
    }

    fn status_name(&self) -> &'static str {
        self.current_status().as_str()
    }

    fn last_event(&self) -> &FileEvent {
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
        digest_of(&FileContent {
            id: &self.id,
            status: self.current_status(),
            resource_id: &self.resource_id,
            owner: &self.owner,
            name: &self.name,
            rejection_reason: &self.rejection_reason,
            import_source: &self.import_source,
            created_date: &self.created_date,
        })
    }

    fn log_entry(&self, event: &FileEvent) -> LogEntry {
        event.to_log_entry(self.id, self.resource_id, Some(&self.name))
    }

    fn into_entity(self) -> Entity {
        Entity::File(self)
    }

    fn from_entity(entity: Entity) -> Option<Self> {
        match entity {
            Entity::File(file) => Some(file),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploaded() -> FileEntry {
        FileEntry::upload(
            NewFile {
                resource_id: EntityId::new(),
                owner: Owner::new("carol@7482", "https://org.example/7482.0.0.0"),
                name: "thesis.pdf".into(),
            },
            EventMeta::by("carol@7482"),
        )
    }

    fn apply(file: &FileEntry, event: FileEvent) -> Result<FileEntry, TransitionError> {
        file.apply_event(event).map(|t| t.entity)
    }

    #[test]
    fn approve_then_retract_returns_to_pending() {
        let approved = apply(&uploaded(), FileEvent::Approved { meta: EventMeta::now() }).unwrap();
        assert_eq!(approved.current_status(), FileStatus::Approved);

        let retracted = apply(&approved, FileEvent::Retracted { meta: EventMeta::now() }).unwrap();
        assert_eq!(retracted.current_status(), FileStatus::Pending);
    }

    #[test]
    fn nothing_follows_deletion() {
        let deleted = apply(&uploaded(), FileEvent::Deleted { meta: EventMeta::now() }).unwrap();
        for event in [
            FileEvent::Approved { meta: EventMeta::now() },
            FileEvent::Hidden { meta: EventMeta::now() },
            FileEvent::Deleted { meta: EventMeta::now() },
            FileEvent::TypeUpdatedByImport {
                meta: EventMeta::now(),
                status: FileStatus::Approved,
                source: ImportSource::new("Brage"),
            },
        ] {
            assert!(apply(&deleted, event).is_err());
        }
    }

    #[test]
    fn import_cannot_set_deleted_type() {
        let err = apply(
            &uploaded(),
            FileEvent::TypeUpdatedByImport {
                meta: EventMeta::now(),
                status: FileStatus::Deleted,
                source: ImportSource::new("Brage"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidPayload { .. }));
    }

    #[test]
    fn type_update_carries_new_status() {
        let hidden = apply(
            &uploaded(),
            FileEvent::TypeUpdatedByImport {
                meta: EventMeta::now(),
                status: FileStatus::Hidden,
                source: ImportSource::new("Brage"),
            },
        )
        .unwrap();
        assert_eq!(hidden.current_status(), FileStatus::Hidden);
        assert_eq!(hidden.import_source, Some(ImportSource::new("Brage")));
    }

    #[test]
    fn file_log_entry_names_the_file() {
        let file = uploaded();
        let entry = file.log_entry(file.last_event());
        assert_eq!(entry.topic, LogTopic::FileUploaded);
        assert_eq!(entry.filename.as_deref(), Some("thesis.pdf"));
        assert_eq!(entry.file_id, Some(file.id));
        assert!(entry.import_source.is_none());
    }
}
