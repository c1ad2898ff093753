//! Integration tests for EntityRepository against the in-memory record store.

use std::sync::Arc;
use std::time::Duration;

use curate_common::{EntityKind, RowVersion};
use curate_domain::{
    Aggregate, Entity, EventMeta, LifecycleEvent, NewResource, Owner, Resource, ResourceEvent, ResourceStatus,
    TransitionError,
};
use curate_events::EventHistory;
use curate_repository::dao;
use curate_repository::{BatchWriteConfig, EntityRepository, RepositoryError, RetryPolicy};
use curate_store::MemoryRecordStore;

fn owner() -> Owner {
    Owner::new("alice@20754", "https://org.example/20754.1.0.0")
}

fn draft(title: &str) -> Resource {
    Resource::create(NewResource::new(owner()).with_title(title), EventMeta::now())
}

fn fast_batches() -> BatchWriteConfig {
    BatchWriteConfig {
        backoff: Duration::from_millis(1),
        ..BatchWriteConfig::default()
    }
}

fn repository() -> (Arc<MemoryRecordStore>, EntityRepository) {
    let store = Arc::new(MemoryRecordStore::new());
    let repo = EntityRepository::new(store.clone()).with_batch_config(fast_batches());
    (store, repo)
}

fn publish(entity: Entity) -> Result<Entity, RepositoryError> {
    let Entity::Resource(resource) = entity else {
        panic!("expected a resource");
    };
    let transition = resource.apply_event(ResourceEvent::Published {
        meta: EventMeta::now(),
    })?;
    Ok(transition.entity.into_entity())
}

// =========================================================================
// Optimistic concurrency
// =========================================================================

#[tokio::test]
async fn update_stamps_a_new_row_version() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();

    let updated = repo.update(&created, publish).await.unwrap();
    assert_ne!(updated.row_version(), created.row_version());
    assert_eq!(updated.status_name(), "PUBLISHED");

    let reread = repo.read(EntityKind::Resource, created.id()).await.unwrap();
    assert_eq!(reread.row_version(), updated.row_version());
}

#[tokio::test]
async fn stale_row_version_is_a_concurrent_modification() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();
    repo.update(&created, Ok).await.unwrap();

    let err = repo.update(&created, publish).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConcurrentModification { .. }));
    assert!(err.is_retryable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn at_most_one_of_two_racing_writers_wins() {
    for _ in 0..20 {
        let (_, repo) = repository();
        let created = repo.create(draft("R1")).await.unwrap();

        let a = {
            let (repo, entity) = (repo.clone(), created.clone());
            tokio::spawn(async move { repo.update(&entity, publish).await })
        };
        let b = {
            let (repo, entity) = (repo.clone(), created.clone());
            tokio::spawn(async move { repo.update(&entity, Ok).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(RepositoryError::ConcurrentModification { .. })))
            .count();
        assert_eq!((winners, losers), (1, 1));
    }
}

#[tokio::test]
async fn create_twice_fails() {
    let (_, repo) = repository();
    let resource = draft("R1");
    repo.create(resource.clone()).await.unwrap();
    let err = repo.create(resource).await.unwrap_err();
    assert!(matches!(err, RepositoryError::ConcurrentModification { .. }));
}

#[tokio::test]
async fn reread_after_rewrite_is_equal_despite_new_row_version() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();
    let rewritten = repo.update(&created, Ok).await.unwrap();

    assert_ne!(created.row_version(), rewritten.row_version());
    assert_eq!(created, rewritten);
    assert_eq!(created.content_digest(), rewritten.content_digest());
}

#[tokio::test]
async fn mutator_errors_leave_the_record_untouched() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();

    let err = repo
        .update(&created, |entity| {
            let Entity::Resource(resource) = entity else {
                unreachable!()
            };
            Ok(resource
                .apply_event(ResourceEvent::Republished {
                    meta: EventMeta::now(),
                })?
                .entity
                .into_entity())
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Transition(TransitionError::IllegalTransition { .. })
    ));

    let stored = repo.read(EntityKind::Resource, created.id()).await.unwrap();
    assert_eq!(stored.row_version(), created.row_version());
}

// =========================================================================
// Retry + apply_event
// =========================================================================

#[tokio::test]
async fn update_with_retry_recovers_from_a_lost_race() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();
    let policy = RetryPolicy {
        max_attempts: 3,
        max_jitter: Duration::from_millis(5),
    };

    let mut calls = 0;
    let racer = repo.clone();
    let snapshot = created.clone();
    let updated = repo
        .update_with_retry(EntityKind::Resource, created.id(), &policy, |entity| {
            calls += 1;
            if calls == 1 {
                // Simulate another writer landing between read and write.
                let racer = racer.clone();
                let snapshot = snapshot.clone();
                std::thread::spawn(move || {
                    tokio::runtime::Runtime::new()
                        .unwrap()
                        .block_on(racer.update(&snapshot, Ok))
                })
                .join()
                .unwrap()
                .unwrap();
            }
            publish(entity)
        })
        .await
        .unwrap();

    assert_eq!(calls, 2);
    assert_eq!(updated.status_name(), "PUBLISHED");
}

#[tokio::test]
async fn single_attempt_policy_surfaces_the_conflict() {
    let (_, repo) = repository();
    let created = repo.create(draft("R1")).await.unwrap();
    let racer = repo.clone();

    let err = repo
        .update_with_retry(EntityKind::Resource, created.id(), &RetryPolicy::once(), |entity| {
            let racer = racer.clone();
            let snapshot = created.clone();
            std::thread::spawn(move || {
                tokio::runtime::Runtime::new()
                    .unwrap()
                    .block_on(racer.update(&snapshot, Ok))
            })
            .join()
            .unwrap()
            .unwrap();
            Ok(entity)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::ConcurrentModification { .. }));
}

#[tokio::test]
async fn apply_event_updates_state_and_history() {
    let store = Arc::new(MemoryRecordStore::new());
    let history = EventHistory::new(Arc::new(MemoryRecordStore::new()));
    let repo = EntityRepository::new(store).with_history(history.clone());

    let resource = draft("R1");
    let id = resource.id;
    repo.create(resource).await.unwrap();

    let policy = RetryPolicy::default();
    let published = repo
        .apply_event::<Resource>(id, ResourceEvent::Published { meta: EventMeta::now() }, &policy)
        .await
        .unwrap();
    assert!(published.effective);
    assert_eq!(published.entity.current_status(), ResourceStatus::Published);

    let deleted = repo
        .apply_event::<Resource>(id, ResourceEvent::Deleted { meta: EventMeta::now() }, &policy)
        .await
        .unwrap();
    assert_eq!(deleted.entity.current_status(), ResourceStatus::Deleted);

    let err = repo
        .apply_event::<Resource>(id, ResourceEvent::Published { meta: EventMeta::now() }, &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Transition(_)));

    let replayed: Resource = history.replay(id).await.unwrap();
    assert_eq!(replayed.current_status(), ResourceStatus::Deleted);
    assert_eq!(replayed, repo.read_as::<Resource>(id).await.unwrap());
}

#[tokio::test]
async fn create_records_the_genesis_event() {
    let store = Arc::new(MemoryRecordStore::new());
    let history = EventHistory::new(Arc::new(MemoryRecordStore::new()));
    let repo = EntityRepository::new(store).with_history(history.clone());

    let created = repo.create(draft("R1")).await.unwrap();

    let events = history.events::<Resource>(created.id()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type(), "created");
    let replayed: Resource = history.replay(created.id()).await.unwrap();
    assert_eq!(Entity::from(replayed), created);
}

#[tokio::test]
async fn create_with_history_down_stores_nothing() {
    let (store, repo) = repository();
    let history_store = Arc::new(MemoryRecordStore::new());
    let repo = repo.with_history(EventHistory::new(history_store.clone()));
    history_store.set_unavailable(true);

    let err = repo.create(draft("R1")).await.unwrap_err();

    assert!(matches!(err, RepositoryError::History(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn repeating_an_event_completes_a_failed_history_append() {
    let (_, repo) = repository();
    let history_store = Arc::new(MemoryRecordStore::new());
    let history = EventHistory::new(history_store.clone());
    let repo = repo.with_history(history.clone());
    let id = repo.create(draft("R1")).await.unwrap().id();
    let policy = RetryPolicy::default();
    let publish = ResourceEvent::Published {
        meta: EventMeta::now(),
    };

    history_store.set_unavailable(true);
    let err = repo
        .apply_event::<Resource>(id, publish.clone(), &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::History(_)));
    let stored = repo.read_as::<Resource>(id).await.unwrap();
    assert_eq!(stored.current_status(), ResourceStatus::Published);

    history_store.set_unavailable(false);
    let repeated = repo
        .apply_event::<Resource>(id, publish, &policy)
        .await
        .unwrap();

    assert!(!repeated.effective);
    assert_eq!(repeated.entity.row_version(), stored.row_version());
    let replayed: Resource = history.replay(id).await.unwrap();
    assert_eq!(replayed, stored);
}

#[tokio::test]
async fn reading_a_missing_entity_is_not_found() {
    let (_, repo) = repository();
    let err = repo
        .read_as::<Resource>(draft("ghost").id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

// =========================================================================
// Bulk writes
// =========================================================================

#[tokio::test]
async fn batch_retries_only_unprocessed_items() {
    let (store, repo) = repository();
    let resources: Vec<Entity> = (0..25).map(|i| draft(&format!("R{i}")).into()).collect();
    for index in [3, 17] {
        store.reject_in_batch_writes(dao::primary_key(EntityKind::Resource, resources[index].id()), 1);
    }

    let report = repo.write_batch(resources).await.unwrap();

    assert_eq!(store.len(), 25);
    assert_eq!(report.written, 25);
    assert_eq!(report.attempts, 2);
    assert_eq!(report.consumed_capacity, 25.0);
    assert_eq!(report.unprocessed_per_round, vec![2, 0]);
    assert_eq!(store.batch_write_calls(), 2);
}

#[tokio::test]
async fn batch_is_chunked_to_the_store_limit() {
    let (store, repo) = repository();
    let resources: Vec<Entity> = (0..60).map(|i| draft(&format!("R{i}")).into()).collect();

    let report = repo.write_batch(resources).await.unwrap();

    assert_eq!(store.len(), 60);
    assert_eq!(report.written, 60);
    assert_eq!(report.attempts, 3);
    assert_eq!(store.batch_write_calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_name_every_unwritten_key() {
    let (store, repo) = repository();
    let repo = repo.with_batch_config(BatchWriteConfig {
        max_attempts: 3,
        ..fast_batches()
    });
    let resources: Vec<Entity> = (0..30).map(|i| draft(&format!("R{i}")).into()).collect();
    let mut stuck = vec![
        dao::primary_key(EntityKind::Resource, resources[1].id()),
        dao::primary_key(EntityKind::Resource, resources[28].id()),
    ];
    for key in &stuck {
        store.reject_in_batch_writes(key.clone(), 10);
    }

    let err = repo.write_batch(resources).await.unwrap_err();

    stuck.sort();
    match err {
        RepositoryError::BatchInsertionFailure { unwritten } => assert_eq!(unwritten, stuck),
        other => panic!("expected BatchInsertionFailure, got {other:?}"),
    }
    assert_eq!(store.len(), 28);
}

#[tokio::test]
async fn store_outage_reports_the_whole_chunk_unwritten() {
    let (store, repo) = repository();
    let resources: Vec<Entity> = (0..3).map(|i| draft(&format!("R{i}")).into()).collect();
    let mut keys: Vec<_> = resources
        .iter()
        .map(|r| dao::primary_key(EntityKind::Resource, r.id()))
        .collect();
    keys.sort();
    store.set_unavailable(true);

    let err = repo.write_batch(resources).await.unwrap_err();

    match err {
        RepositoryError::BatchInsertionFailure { unwritten } => assert_eq!(unwritten, keys),
        other => panic!("expected BatchInsertionFailure, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_write_overwrites_row_versions() {
    let (_, repo) = repository();
    let resource = draft("R1").with_row_version(RowVersion::from("fixture".to_string()));
    let id = resource.id;

    repo.write_batch(vec![resource.into()]).await.unwrap();

    let stored = repo.read(EntityKind::Resource, id).await.unwrap();
    assert_ne!(stored.row_version().as_str(), "fixture");
}
