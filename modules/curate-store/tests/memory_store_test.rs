//! Behavioural tests for the in-memory record store.

use std::collections::{BTreeMap, HashSet};

use curate_store::{
    Condition, Key, MemoryRecordStore, QueryParams, Record, RecordStore, ScanParams,
    SortKeyCondition, StoreError, MAX_BATCH_WRITE_ITEMS,
};
use serde_json::json;

fn record(n: usize) -> Record {
    Record::new(Key::new(format!("Item:{n:03}"), "Item"), json!({ "n": n }))
        .with_attribute("kind", if n % 2 == 0 { "even" } else { "odd" })
        .with_index("ByParity", Key::new(if n % 2 == 0 { "even" } else { "odd" }, format!("{n:03}")))
        .with_attribute("row_version", "v1")
}

async fn seeded(count: usize) -> MemoryRecordStore {
    let store = MemoryRecordStore::new();
    for n in 0..count {
        store.put(record(n), None).await.unwrap();
    }
    store
}

#[tokio::test]
async fn conditional_put_rejects_existing_key() {
    let store = seeded(1).await;
    let err = store
        .put(record(0), Some(Condition::NotExists))
        .await
        .unwrap_err();
    assert!(err.is_condition_failed());
}

#[tokio::test]
async fn attribute_condition_guards_overwrite() {
    let store = seeded(1).await;

    let stale = store
        .put(
            record(0).with_attribute("row_version", "v2"),
            Some(Condition::attribute_equals("row_version", "v0")),
        )
        .await;
    assert!(matches!(stale, Err(StoreError::ConditionFailed { .. })));

    store
        .put(
            record(0).with_attribute("row_version", "v2"),
            Some(Condition::attribute_equals("row_version", "v1")),
        )
        .await
        .unwrap();

    let stored = store.get(&record(0).key).await.unwrap().unwrap();
    assert_eq!(stored.attribute("row_version"), Some("v2"));
}

#[tokio::test]
async fn attribute_condition_fails_when_record_missing() {
    let store = MemoryRecordStore::new();
    let err = store
        .put(record(0), Some(Condition::attribute_equals("row_version", "v1")))
        .await
        .unwrap_err();
    assert!(err.is_condition_failed());
}

#[tokio::test]
async fn paged_scan_visits_every_item_once() {
    let store = seeded(23).await;
    let mut seen = HashSet::new();
    let mut start = None;
    let mut pages = 0;

    loop {
        let page = store
            .scan(ScanParams {
                limit: 5,
                start,
                ..Default::default()
            })
            .await
            .unwrap();
        pages += 1;
        for item in &page.items {
            assert!(seen.insert(item.key.clone()), "visited {} twice", item.key);
        }
        match page.last_evaluated {
            Some(cursor) => {
                // Cursors survive a trip through JSON, as they do between invocations.
                let wire = serde_json::to_string(&cursor).unwrap();
                start = Some(serde_json::from_str(&wire).unwrap());
            }
            None => break,
        }
    }

    assert_eq!(pages, 5);
    assert_eq!(seen.len(), 23);
}

#[tokio::test]
async fn attribute_filter_applies_after_limit() {
    let store = seeded(10).await;
    let page = store
        .scan(ScanParams {
            limit: 4,
            attribute_filter: BTreeMap::from([("kind".to_string(), "even".to_string())]),
            ..Default::default()
        })
        .await
        .unwrap();

    // Items 0..4 were examined; two of them are even.
    assert_eq!(page.items.len(), 2);
    assert!(page.is_truncated());
}

#[tokio::test]
async fn index_scan_and_query_follow_index_order() {
    let store = seeded(6).await;

    let page = store
        .scan(ScanParams {
            index: Some("ByParity".into()),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    let order: Vec<_> = page.items.iter().map(|r| r.data["n"].as_u64().unwrap()).collect();
    assert_eq!(order, vec![0, 2, 4, 1, 3, 5]);

    let odd = store
        .query(QueryParams {
            index: Some("ByParity".into()),
            pk: "odd".into(),
            sk: SortKeyCondition::Equals("003".into()),
            limit: 10,
            start: None,
        })
        .await
        .unwrap();
    assert_eq!(odd.items.len(), 1);
    assert_eq!(odd.items[0].key, Key::new("Item:003", "Item"));
}

#[tokio::test]
async fn table_cursor_cannot_resume_index_scan() {
    let store = seeded(6).await;
    let page = store
        .scan(ScanParams {
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();

    let err = store
        .scan(ScanParams {
            index: Some("ByParity".into()),
            limit: 2,
            start: page.last_evaluated,
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidCursor(_)));
}

#[tokio::test]
async fn planted_index_entry_resolves_to_missing_primary() {
    let store = seeded(2).await;
    let ghost = Record::new(Key::new("Item:999", "Item"), json!({ "n": 999 }))
        .with_index("ByParity", Key::new("odd", "999"));
    store.plant_index_entry("ByParity", ghost);

    let hits = store
        .query(QueryParams::index_key("ByParity", &Key::new("odd", "999"), 10))
        .await
        .unwrap();
    assert_eq!(hits.items.len(), 1);
    assert!(store.get(&hits.items[0].key).await.unwrap().is_none());
}

#[tokio::test]
async fn batch_write_reports_rejected_items_as_unprocessed() {
    let store = MemoryRecordStore::new();
    store.reject_in_batch_writes(record(1).key, 1);

    let first = store.batch_write(vec![record(0), record(1)]).await.unwrap();
    assert_eq!(first.unprocessed.len(), 1);
    assert_eq!(first.consumed_capacity, 1.0);

    let second = store.batch_write(first.unprocessed).await.unwrap();
    assert!(second.unprocessed.is_empty());
    assert_eq!(store.len(), 2);
    assert_eq!(store.batch_write_calls(), 2);
}

#[tokio::test]
async fn oversized_batch_is_refused() {
    let store = MemoryRecordStore::new();
    let records = (0..MAX_BATCH_WRITE_ITEMS + 1).map(record).collect();
    let err = store.batch_write(records).await.unwrap_err();
    assert!(matches!(err, StoreError::BatchTooLarge { size: 26, max: 25 }));
}

#[tokio::test]
async fn unavailable_store_fails_every_call() {
    let store = seeded(1).await;
    store.set_unavailable(true);
    assert!(matches!(
        store.get(&record(0).key).await,
        Err(StoreError::Unavailable(_))
    ));
}
