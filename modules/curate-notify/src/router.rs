use std::sync::Arc;

use curate_common::{attributes, EntityKind};
use curate_store::Record;
use tracing::debug;

use crate::bus::EventBus;
use crate::error::NotifyError;
use crate::types::{Notification, Topic};

/// Status value that marks a tombstoned entity.
const DELETED: &str = "DELETED";

/// Classifies record changes and publishes the ones worth propagating.
pub struct ChangeRouter {
    bus: Arc<dyn EventBus>,
}

impl ChangeRouter {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// Map an (old, new) pair to its topic.
    ///
    /// The entity kind comes from `entity_type`; a pair whose sides disagree
    /// is an error rather than a guess. A missing new side, or a new side
    /// whose status is `DELETED`, selects the kind's delete topic where the
    /// kind has one.
    pub fn classify(old: Option<&Record>, new: Option<&Record>) -> Result<Topic, NotifyError> {
        let kind = match (old.map(entity_kind).transpose()?, new.map(entity_kind).transpose()?) {
            (None, None) => return Err(NotifyError::NothingToClassify),
            (Some(old), Some(new)) if old != new => {
                return Err(NotifyError::EntityKindMismatch { old, new })
            }
            (Some(kind), _) | (_, Some(kind)) => kind,
        };

        let deleted = new.is_none_or(|record| record.attribute(attributes::STATUS) == Some(DELETED));

        Ok(match (kind, deleted) {
            (EntityKind::Resource, false) => Topic::ResourceUpdated,
            (EntityKind::Resource, true) => Topic::ResourceDeleted,
            (EntityKind::Ticket, _) => Topic::TicketUpdated,
            (EntityKind::File, false) => Topic::FileUpdated,
            (EntityKind::File, true) => Topic::FileDeleted,
        })
    }

    /// False when there is nothing on either side, or when both sides carry
    /// the same content digest (a recorded but non-effective change).
    pub fn should_propagate(old: Option<&Record>, new: Option<&Record>) -> bool {
        match (old, new) {
            (None, None) => false,
            (Some(old), Some(new)) => {
                let digest = |record: &Record| record.attribute(attributes::DIGEST).map(str::to_owned);
                match (digest(old), digest(new)) {
                    (Some(a), Some(b)) => a != b,
                    _ => true,
                }
            }
            _ => true,
        }
    }

    /// Classify and publish. Returns the topic used, or `None` when the change
    /// was suppressed.
    pub async fn route(
        &self,
        old: Option<&Record>,
        new: Option<&Record>,
    ) -> Result<Option<Topic>, NotifyError> {
        if !Self::should_propagate(old, new) {
            debug!(
                key = %old.or(new).map(|r| r.key.to_string()).unwrap_or_default(),
                "Change not effective, notification suppressed"
            );
            return Ok(None);
        }

        let topic = Self::classify(old, new)?;
        let notification = Notification {
            topic,
            old_data: old.map(|record| record.data.clone()),
            new_data: new.map(|record| record.data.clone()),
        };

        self.bus
            .publish(topic, notification.to_payload())
            .await
            .map_err(|e| NotifyError::Publish {
                topic,
                reason: e.to_string(),
            })?;
        Ok(Some(topic))
    }
}

fn entity_kind(record: &Record) -> Result<EntityKind, NotifyError> {
    let raw = record
        .attribute(attributes::ENTITY_TYPE)
        .ok_or_else(|| NotifyError::UnknownEntityType(format!("<missing> on {}", record.key)))?;
    raw.parse()
        .map_err(|_| NotifyError::UnknownEntityType(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use curate_store::Key;
    use serde_json::json;

    fn record(kind: &str, status: &str, digest: &str) -> Record {
        Record::new(Key::new(format!("{kind}:1"), kind), json!({"blob": "ignored"}))
            .with_attribute(attributes::ENTITY_TYPE, kind)
            .with_attribute(attributes::STATUS, status)
            .with_attribute(attributes::DIGEST, digest)
    }

    #[test]
    fn resource_topics_follow_status() {
        let draft = record("Resource", "DRAFT", "a");
        let deleted = record("Resource", "DELETED", "b");
        assert_eq!(
            ChangeRouter::classify(None, Some(&draft)).unwrap(),
            Topic::ResourceUpdated
        );
        assert_eq!(
            ChangeRouter::classify(Some(&draft), Some(&deleted)).unwrap(),
            Topic::ResourceDeleted
        );
        assert_eq!(
            ChangeRouter::classify(Some(&draft), None).unwrap(),
            Topic::ResourceDeleted
        );
    }

    #[test]
    fn file_and_ticket_topics() {
        let file = record("File", "APPROVED", "a");
        let removed = record("File", "DELETED", "b");
        let ticket = record("Ticket", "PENDING", "c");
        assert_eq!(ChangeRouter::classify(None, Some(&file)).unwrap(), Topic::FileUpdated);
        assert_eq!(
            ChangeRouter::classify(Some(&file), Some(&removed)).unwrap(),
            Topic::FileDeleted
        );
        assert_eq!(ChangeRouter::classify(None, Some(&ticket)).unwrap(), Topic::TicketUpdated);
    }

    #[test]
    fn unknown_entity_type_fails_fast() {
        let message = record("Message", "SENT", "a");
        assert!(matches!(
            ChangeRouter::classify(None, Some(&message)),
            Err(NotifyError::UnknownEntityType(kind)) if kind == "Message"
        ));

        let bare = Record::new(Key::new("x", "y"), json!({}));
        assert!(matches!(
            ChangeRouter::classify(Some(&bare), None),
            Err(NotifyError::UnknownEntityType(_))
        ));
    }

    #[test]
    fn mismatched_kinds_are_rejected() {
        let resource = record("Resource", "DRAFT", "a");
        let file = record("File", "PENDING", "a");
        assert!(matches!(
            ChangeRouter::classify(Some(&resource), Some(&file)),
            Err(NotifyError::EntityKindMismatch {
                old: EntityKind::Resource,
                new: EntityKind::File
            })
        ));
        assert!(matches!(
            ChangeRouter::classify(None, None),
            Err(NotifyError::NothingToClassify)
        ));
    }

    #[test]
    fn identical_digests_are_not_propagated() {
        let a = record("Resource", "PUBLISHED", "same");
        let b = record("Resource", "PUBLISHED", "same");
        let c = record("Resource", "PUBLISHED", "other");
        assert!(!ChangeRouter::should_propagate(None, None));
        assert!(!ChangeRouter::should_propagate(Some(&a), Some(&b)));
        assert!(ChangeRouter::should_propagate(Some(&a), Some(&c)));
        assert!(ChangeRouter::should_propagate(None, Some(&a)));
        assert!(ChangeRouter::should_propagate(Some(&a), None));
    }
}
