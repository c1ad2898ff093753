//! Mapping between entities and their stored records.
//!
//! Primary keys are `({Kind}:{id}, {Kind})`. Secondary indexes give the
//! alternate access paths:
//!
//! | index          | pk                         | sk            |
//! |----------------|----------------------------|---------------|
//! | `ByOwner`      | `Owner:{username}`         | `{Kind}:{id}` |
//! | `ByStatusYear` | `Status:{STATUS}#{year}`   | `Resource:{id}` |
//! | `ByParent`     | `Resource:{resourceId}`    | `{Kind}:{id}` |
//!
//! Structured attributes (`entity_type`, `status`, `row_version`, `digest`)
//! let readers classify a record without touching `data`.

use curate_common::{attributes, EntityId, EntityKind};
use curate_domain::Entity;
use curate_store::{Key, Record};

use crate::error::RepositoryError;

pub const INDEX_BY_OWNER: &str = "ByOwner";
pub const INDEX_BY_STATUS_YEAR: &str = "ByStatusYear";
pub const INDEX_BY_PARENT: &str = "ByParent";

/// Year placeholder for resources without a publication year.
const NO_YEAR: &str = "NONE";

pub fn primary_key(kind: EntityKind, id: EntityId) -> Key {
    Key::new(format!("{kind}:{id}"), kind.as_str())
}

/// Inverse of `primary_key`. `None` for anything that is not an entity key.
pub fn parse_primary_key(key: &Key) -> Option<(EntityKind, EntityId)> {
    let (kind, id) = key.pk.split_once(':')?;
    let kind: EntityKind = kind.parse().ok()?;
    if key.sk != kind.as_str() {
        return None;
    }
    Some((kind, id.parse().ok()?))
}

fn entity_sk(kind: EntityKind, id: EntityId) -> String {
    format!("{kind}:{id}")
}

pub fn status_year_pk(status: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("Status:{status}#{year}"),
        None => format!("Status:{status}#{NO_YEAR}"),
    }
}

pub fn owner_pk(username: &str) -> String {
    format!("Owner:{username}")
}

pub fn parent_pk(resource_id: EntityId) -> String {
    format!("Resource:{resource_id}")
}

/// Build the stored record for an entity, with every index key it belongs to.
pub fn to_record(entity: &Entity) -> Record {
    let kind = entity.kind();
    let id = entity.id();

    let mut record = Record::new(primary_key(kind, id), entity.to_payload())
        .with_index(
            INDEX_BY_OWNER,
            Key::new(owner_pk(&entity.owner().username), entity_sk(kind, id)),
        )
        .with_attribute(attributes::ENTITY_TYPE, kind.as_str())
        .with_attribute(attributes::STATUS, entity.status_name())
        .with_attribute(attributes::ROW_VERSION, entity.row_version().as_str())
        .with_attribute(attributes::DIGEST, entity.content_digest());

    match entity {
        Entity::Resource(resource) => {
            record = record.with_index(
                INDEX_BY_STATUS_YEAR,
                Key::new(
                    status_year_pk(entity.status_name(), resource.publication_year),
                    entity_sk(kind, id),
                ),
            );
        }
        Entity::Ticket(ticket) => {
            record = record.with_index(
                INDEX_BY_PARENT,
                Key::new(parent_pk(ticket.resource_id), entity_sk(kind, id)),
            );
        }
        Entity::File(file) => {
            record = record.with_index(
                INDEX_BY_PARENT,
                Key::new(parent_pk(file.resource_id), entity_sk(kind, id)),
            );
        }
    }

    record
}

/// Parse a record's blob back into its entity.
pub fn from_record(record: &Record) -> Result<Entity, RepositoryError> {
    let entity = Entity::from_payload(&record.data).map_err(|e| RepositoryError::Mapping {
        key: record.key.clone(),
        reason: e.to_string(),
    })?;

    if let Some(stored_kind) = record.attribute(attributes::ENTITY_TYPE) {
        if stored_kind != entity.kind().as_str() {
            return Err(RepositoryError::Mapping {
                key: record.key.clone(),
                reason: format!(
                    "entity_type attribute is {stored_kind} but data holds a {}",
                    entity.kind()
                ),
            });
        }
    }

    Ok(entity)
}
