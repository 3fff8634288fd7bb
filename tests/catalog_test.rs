//! Catalog store: aggregate roll-up, stale sweep, upsert idempotence.

mod helpers;

use catalog_core::catalog::UpsertEntry;
use catalog_core::database::entities::entry::EntryKind;
use helpers::{dir_entry, file_entry, open_test_catalog};

#[tokio::test]
async fn aggregates_propagate_up_the_tree() {
    let test = open_test_catalog().await;
    let store = &test.store;

    store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    store.upsert_entry(dir_entry("/r/a", Some("/r"), 0, 0, 1)).await.unwrap();
    store
        .upsert_entry(dir_entry("/r/a/b", Some("/r/a"), 0, 0, 1))
        .await
        .unwrap();
    store
        .upsert_entry(file_entry("/r/a/b/f", Some("/r/a/b"), 100, 0, 0, 1))
        .await
        .unwrap();

    store.compute_aggregates("/r").await.unwrap();

    assert_eq!(store.get_by_path("/r").await.unwrap().unwrap().size, 100);
    assert_eq!(store.get_by_path("/r/a").await.unwrap().unwrap().size, 100);
    assert_eq!(store.get_by_path("/r/a/b").await.unwrap().unwrap().size, 100);
}

#[tokio::test]
async fn stale_sweep_deletes_only_entries_scanned_before_the_cutoff() {
    let test = open_test_catalog().await;
    let store = &test.store;

    store.upsert_entry(dir_entry("/r", None, 0, 0, 2000)).await.unwrap();
    store
        .upsert_entry(file_entry("/r/old", Some("/r"), 10, 0, 0, 1000))
        .await
        .unwrap();
    store
        .upsert_entry(file_entry("/r/new", Some("/r"), 10, 0, 0, 2000))
        .await
        .unwrap();

    let deleted = store.delete_stale("/r", 2000).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(store.get_by_path("/r/old").await.unwrap().is_none());
    assert!(store.get_by_path("/r/new").await.unwrap().is_some());
}

#[tokio::test]
async fn delete_stale_with_runid_past_everything_clears_the_whole_subtree() {
    let test = open_test_catalog().await;
    let store = &test.store;

    store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    store
        .upsert_entry(file_entry("/r/a", Some("/r"), 10, 0, 0, 1))
        .await
        .unwrap();
    store
        .upsert_entry(file_entry("/r/b", Some("/r"), 10, 0, 0, 1))
        .await
        .unwrap();

    let deleted = store.delete_stale("/r", i64::MAX).await.unwrap();
    assert_eq!(deleted, 3);
}

#[tokio::test]
async fn upserting_twice_with_identical_attributes_preserves_the_id() {
    let test = open_test_catalog().await;
    let store = &test.store;

    let entry = file_entry("/r/f", None, 42, 10, 10, 1);
    store.upsert_entry(entry.clone()).await.unwrap();
    let first = store.get_by_path("/r/f").await.unwrap().unwrap();

    store.upsert_entry(entry).await.unwrap();
    let second = store.get_by_path("/r/f").await.unwrap().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.size, second.size);
}

#[tokio::test]
async fn upsert_rejects_a_parent_that_does_not_exist() {
    let test = open_test_catalog().await;
    let store = &test.store;

    let err = store
        .upsert_entry(file_entry("/missing-root/f", Some("/missing-root"), 1, 0, 0, 1))
        .await
        .expect_err("parent must exist before a child can reference it");
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn upsert_rejects_changing_an_existing_entrys_kind() {
    let test = open_test_catalog().await;
    let store = &test.store;

    store.upsert_entry(file_entry("/r/f", None, 1, 0, 0, 1)).await.unwrap();

    let flipped = UpsertEntry {
        path: "/r/f".to_string(),
        parent: None,
        size: 0,
        kind: EntryKind::Directory,
        ctime: 0,
        mtime: 0,
        last_scanned: 1,
    };
    assert!(store.upsert_entry(flipped).await.is_err());
}

#[tokio::test]
async fn delete_entry_reparents_children_to_root_instead_of_cascading() {
    let test = open_test_catalog().await;
    let store = &test.store;

    store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    store
        .upsert_entry(file_entry("/r/child", Some("/r"), 5, 0, 0, 1))
        .await
        .unwrap();

    assert!(store.delete_entry("/r").await.unwrap());
    let child = store.get_by_path("/r/child").await.unwrap().unwrap();
    assert!(child.parent.is_none());
}
