//! Saved queries: filter compilation, execution history, sort/pattern/limit
//! interactions.

mod helpers;

use catalog_core::query::{FileFilter, QueryType, SortBy, UpdateMode};
use helpers::{file_entry, open_test_catalog};

#[tokio::test]
async fn saved_queries_sort_and_limit_results() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/a", None, 300, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(file_entry("/r/b", None, 100, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(file_entry("/r/c", None, 200, 0, 0, 1)).await.unwrap();

    let filter = FileFilter {
        sort_by: SortBy::Size,
        descending: true,
        limit: Some(2),
        ..Default::default()
    };
    test.queries
        .save("biggest", QueryType::FileFilter, &filter, None, UpdateMode::Replace)
        .await
        .unwrap();

    let rows = test.queries.run_saved("biggest").await.unwrap();
    assert_eq!(rows.iter().map(|r| r.size).collect::<Vec<_>>(), vec![300, 200]);
}

#[tokio::test]
async fn a_pattern_narrows_results_after_the_store_side_predicates() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/keep.jpg", None, 10, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(file_entry("/r/skip.jpg", None, 10, 0, 0, 1)).await.unwrap();

    let filter = FileFilter {
        extensions: vec!["jpg".to_string()],
        pattern: Some("keep".to_string()),
        ..Default::default()
    };
    test.queries
        .save("kept-jpgs", QueryType::FileFilter, &filter, None, UpdateMode::Replace)
        .await
        .unwrap();

    let rows = test.queries.run_saved("kept-jpgs").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].path, "/r/keep.jpg");
}

#[tokio::test]
async fn saved_queries_accumulate_execution_history() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/a.jpg", None, 10, 0, 0, 1)).await.unwrap();

    let filter = FileFilter {
        extensions: vec!["jpg".to_string()],
        ..Default::default()
    };
    test.queries
        .save("jpgs", QueryType::FileFilter, &filter, None, UpdateMode::Replace)
        .await
        .unwrap();

    test.queries.run_saved("jpgs").await.unwrap();
    test.queries.run_saved("jpgs").await.unwrap();

    let executions = test.queries.executions("jpgs").await.unwrap();
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.status == "success"));

    let saved = test.queries.get("jpgs").await.unwrap().unwrap();
    assert_eq!(saved.execution_count, 2);
}

#[tokio::test]
async fn running_a_saved_query_with_a_corrupt_pattern_records_a_failed_execution() {
    let test = open_test_catalog().await;

    let filter = FileFilter {
        pattern: Some("(unclosed".to_string()),
        ..Default::default()
    };
    test.queries
        .save("broken", QueryType::FileFilter, &filter, None, UpdateMode::Replace)
        .await
        .unwrap();

    assert!(test.queries.run_saved("broken").await.is_err());

    let executions = test.queries.executions("broken").await.unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, "error");
    assert!(executions[0].error_message.is_some());
}

#[tokio::test]
async fn running_an_unknown_saved_query_is_not_found() {
    let test = open_test_catalog().await;
    let err = test.queries.run_saved("does-not-exist").await.expect_err("unknown query name");
    assert!(err.is_not_found());
}
