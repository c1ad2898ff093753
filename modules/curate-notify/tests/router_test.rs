//! Routing real entity records through ChangeRouter into an in-memory bus.

use std::sync::Arc;

use curate_domain::{
    Aggregate, Entity, EventMeta, NewResource, Owner, Resource, ResourceEvent,
};
use curate_notify::{ChangeRouter, MemoryEventBus, Notification, NotifyError, Topic};
use curate_repository::dao;

fn draft() -> Resource {
    Resource::create(
        NewResource::new(Owner::new("alice@20754", "https://org.example/20754.1.0.0")),
        EventMeta::now(),
    )
}

fn router() -> (Arc<MemoryEventBus>, ChangeRouter) {
    let bus = Arc::new(MemoryEventBus::new());
    (bus.clone(), ChangeRouter::new(bus))
}

#[tokio::test]
async fn effective_change_is_published_with_both_images() {
    let (bus, router) = router();
    let before = draft();
    let after = before
        .apply_event(ResourceEvent::Published {
            meta: EventMeta::now(),
        })
        .unwrap()
        .entity;

    let old = dao::to_record(&Entity::from(before));
    let new = dao::to_record(&Entity::from(after));
    let topic = router.route(Some(&old), Some(&new)).await.unwrap();

    assert_eq!(topic, Some(Topic::ResourceUpdated));
    let published = bus.published();
    assert_eq!(published.len(), 1);
    let notification: Notification = serde_json::from_value(published[0].1.clone()).unwrap();
    assert_eq!(notification.topic, Topic::ResourceUpdated);
    assert_eq!(notification.old_data, Some(old.data));
    assert_eq!(notification.new_data, Some(new.data));
    assert_eq!(published[0].1["topic"], "resource-updated");
}

#[tokio::test]
async fn rewrite_with_new_row_version_only_is_suppressed() {
    let (bus, router) = router();
    let resource = draft();
    let rewritten = resource.clone().with_row_version(Default::default());

    let old = dao::to_record(&Entity::from(resource));
    let new = dao::to_record(&Entity::from(rewritten));
    assert_ne!(old.data, new.data);

    assert_eq!(router.route(Some(&old), Some(&new)).await.unwrap(), None);
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn non_effective_merge_is_suppressed() {
    let (bus, router) = router();
    let source = curate_domain::ImportSource::new("Scopus");
    let merge = |resource: &Resource| {
        resource
            .apply_event(ResourceEvent::Merged {
                meta: EventMeta::now(),
                source: source.clone(),
                title: None,
            })
            .unwrap()
            .entity
    };
    let published = draft()
        .apply_event(ResourceEvent::Published {
            meta: EventMeta::now(),
        })
        .unwrap()
        .entity;
    let merged_once = merge(&published);
    let merged_twice = merge(&merged_once);

    let old = dao::to_record(&Entity::from(merged_once));
    let new = dao::to_record(&Entity::from(merged_twice));
    assert_eq!(router.route(Some(&old), Some(&new)).await.unwrap(), None);
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn deletion_goes_to_the_delete_topic() {
    let (bus, router) = router();
    let before = draft();
    let after = before
        .apply_event(ResourceEvent::Deleted {
            meta: EventMeta::now(),
        })
        .unwrap()
        .entity;

    let old = dao::to_record(&Entity::from(before));
    let new = dao::to_record(&Entity::from(after));
    router.route(Some(&old), Some(&new)).await.unwrap();

    assert_eq!(bus.topics(), vec![Topic::ResourceDeleted]);
}

#[tokio::test]
async fn bus_failure_surfaces_as_publish_error() {
    let (bus, router) = router();
    bus.fail_publishes(true);
    let record = dao::to_record(&Entity::from(draft()));

    let err = router.route(None, Some(&record)).await.unwrap_err();
    assert!(matches!(
        err,
        NotifyError::Publish {
            topic: Topic::ResourceUpdated,
            ..
        }
    ));
}
