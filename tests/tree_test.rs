//! Bounded tree view: empty-directory boundary case and child-threshold
//! summarization.

mod helpers;

use catalog_core::tree::{get_tree, SortBy, TreeOptions};
use helpers::{dir_entry, file_entry, open_test_catalog};

#[tokio::test]
async fn an_empty_directory_is_a_single_node_with_no_children_and_no_summary() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();

    let node = get_tree(&test.store, "/r", &TreeOptions::default(), None).await.unwrap();
    assert_eq!(node.path, "/r");
    assert!(node.children.is_empty());
    assert!(node.summary.is_none());
    assert!(!node.truncated);
}

#[tokio::test]
async fn a_directory_past_the_child_threshold_is_summarized() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    for i in 0..5 {
        test.store
            .upsert_entry(file_entry(&format!("/r/f{i}"), Some("/r"), (i + 1) * 10, 0, 0, 1))
            .await
            .unwrap();
    }

    let opts = TreeOptions {
        child_threshold: 3,
        sort_by: SortBy::Size,
        descending: true,
        ..Default::default()
    };
    let node = get_tree(&test.store, "/r", &opts, None).await.unwrap();

    assert!(node.truncated);
    let summary = node.summary.expect("summarized directory carries a summary");
    assert_eq!(summary.total_children, 5);
    assert_eq!(summary.file_count, 5);
    assert_eq!(summary.directory_count, 0);
    assert_eq!(summary.total_size, 150);
    // Largest child first: f4 has size 50.
    assert_eq!(summary.largest_children[0].path, "/r/f4");
}

#[tokio::test]
async fn max_depth_zero_recurses_without_limit_below_the_root() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(dir_entry("/r/a", Some("/r"), 0, 0, 1)).await.unwrap();
    test.store
        .upsert_entry(file_entry("/r/a/f", Some("/r/a"), 10, 0, 0, 1))
        .await
        .unwrap();

    let node = get_tree(&test.store, "/r", &TreeOptions::default(), None).await.unwrap();
    assert_eq!(node.children.len(), 1);
    assert_eq!(node.children[0].children.len(), 1);
    assert_eq!(node.children[0].children[0].path, "/r/a/f");
}

#[tokio::test]
async fn max_depth_one_truncates_grandchildren() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(dir_entry("/r", None, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(dir_entry("/r/a", Some("/r"), 0, 0, 1)).await.unwrap();
    test.store
        .upsert_entry(file_entry("/r/a/f", Some("/r/a"), 10, 0, 0, 1))
        .await
        .unwrap();

    let opts = TreeOptions {
        max_depth: 1,
        ..Default::default()
    };
    let node = get_tree(&test.store, "/r", &opts, None).await.unwrap();
    assert_eq!(node.children.len(), 1);
    let child = &node.children[0];
    assert_eq!(child.path, "/r/a");
    assert!(child.truncated);
    assert!(child.children.is_empty());
}
