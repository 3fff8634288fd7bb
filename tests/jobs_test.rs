//! Index/classifier job lifecycle against a real write queue and store.

mod helpers;

use catalog_core::jobs::JobStatus;
use helpers::open_test_catalog;

#[tokio::test]
async fn an_index_job_runs_through_its_full_lifecycle() {
    let test = open_test_catalog().await;
    let job = test.index_jobs.create("job-1", "/r").await.unwrap();
    assert_eq!(job.status, "pending");
    assert!(job.started_at.is_none());

    let running = test.index_jobs.transition("job-1", JobStatus::Running).await.unwrap();
    assert_eq!(running.status, "running");
    assert!(running.started_at.is_some());

    let completed = test.index_jobs.transition("job-1", JobStatus::Completed).await.unwrap();
    assert_eq!(completed.status, "completed");
    assert!(completed.completed_at.is_some());
}

#[tokio::test]
async fn an_index_job_can_be_paused_before_it_starts_and_resumed() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-2", "/r").await.unwrap();

    let paused = test.index_jobs.transition("job-2", JobStatus::Paused).await.unwrap();
    assert_eq!(paused.status, "paused");
    assert!(paused.started_at.is_none());

    let running = test.index_jobs.transition("job-2", JobStatus::Running).await.unwrap();
    assert_eq!(running.status, "running");
    assert!(running.started_at.is_some());
}

#[tokio::test]
async fn completing_a_job_that_never_started_is_rejected() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-3", "/r").await.unwrap();

    let err = test
        .index_jobs
        .transition("job-3", JobStatus::Completed)
        .await
        .expect_err("pending -> completed skips running and is not allowed");
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn transitioning_out_of_a_terminal_state_is_rejected() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-4", "/r").await.unwrap();
    test.index_jobs.transition("job-4", JobStatus::Running).await.unwrap();
    test.index_jobs.transition("job-4", JobStatus::Cancelled).await.unwrap();

    assert!(test.index_jobs.transition("job-4", JobStatus::Running).await.is_err());
}

#[tokio::test]
async fn set_error_marks_an_index_job_failed_with_the_error_recorded() {
    let test = open_test_catalog().await;
    test.index_jobs.create("job-5", "/r").await.unwrap();
    test.index_jobs.transition("job-5", JobStatus::Running).await.unwrap();

    let failed = test.index_jobs.set_error("job-5", "disk unreadable").await.unwrap();
    assert_eq!(failed.status, "failed");
    assert_eq!(failed.error.as_deref(), Some("disk unreadable"));
    assert!(failed.completed_at.is_some());
}

#[tokio::test]
async fn a_classifier_job_records_its_artifact_types_and_transitions() {
    let test = open_test_catalog().await;
    let job = test
        .classifier_jobs
        .create("cjob-1", None, "/r/image.png", &["thumbnail".to_string()])
        .await
        .unwrap();
    assert_eq!(job.status, "pending");
    assert_eq!(job.local_path, "/r/image.png");

    let running = test
        .classifier_jobs
        .transition("cjob-1", JobStatus::Running)
        .await
        .unwrap();
    assert_eq!(running.status, "running");

    let completed = test
        .classifier_jobs
        .transition("cjob-1", JobStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, "completed");
}
