//! Progress tracker: batches frequent updates into far fewer store writes.

mod helpers;

use catalog_core::config::ProgressTrackerConfig;
use helpers::open_test_catalog;
use std::time::Duration;

#[tokio::test]
async fn frequent_updates_are_batched_under_the_flush_interval() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-1", "/r").await.unwrap();

    let tracker = test.index_progress(
        "job-1",
        ProgressTrackerConfig {
            flush_interval: Duration::from_millis(50),
        },
    );

    for i in 0..1000 {
        tracker.update(i, None).await;
    }

    tracker
        .flush_sync(Duration::from_secs(2))
        .await
        .expect("final flush lands");

    let job = test.index_jobs.get("job-1").await.unwrap().unwrap();
    assert_eq!(job.progress, 999);
}

#[tokio::test]
async fn get_progress_and_metadata_reflect_the_latest_update_before_any_flush() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-2", "/r").await.unwrap();

    let tracker = test.index_progress(
        "job-2",
        ProgressTrackerConfig {
            flush_interval: Duration::from_secs(3600),
        },
    );

    tracker.update(1, None).await;
    tracker.update(2, Some(serde_json::json!({"files": 2}))).await;

    assert_eq!(tracker.get_progress().await, 2);
    assert_eq!(
        tracker.get_metadata().await,
        Some(serde_json::json!({"files": 2}))
    );
    assert!(tracker.is_dirty().await);
}
