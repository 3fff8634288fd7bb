//! Write queue: serialization under contention, ordering, and shutdown
//! behavior.

mod helpers;

use catalog_core::database::entities::entry;
use catalog_core::write_queue::WriteQueue;
use helpers::open_test_catalog;
use sea_orm::{ActiveModelTrait, ActiveValue::Set as ActiveSet};

#[tokio::test]
async fn ten_producers_inserting_ten_rows_each_land_exactly_one_hundred_distinct_rows() {
    let test = open_test_catalog().await;

    let mut handles = Vec::new();
    for producer in 0..10 {
        let queue = test.queue.clone();
        handles.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for i in 0..10 {
                let path = format!("/p{producer}/f{i}");
                results.push(
                    queue
                        .submit(
                            None,
                            Box::new(move |conn| {
                                Box::pin(async move {
                                    let active = entry::ActiveModel {
                                        id: Default::default(),
                                        path: ActiveSet(path),
                                        parent: ActiveSet(None),
                                        size: ActiveSet(1),
                                        kind: ActiveSet(0),
                                        ctime: ActiveSet(0),
                                        mtime: ActiveSet(0),
                                        last_scanned: ActiveSet(1),
                                        dirty: ActiveSet(false),
                                        blocks: ActiveSet(None),
                                    };
                                    active.insert(conn).await?;
                                    Ok(())
                                })
                            }),
                        )
                        .await,
                );
            }
            results
        }));
    }

    for handle in handles {
        for result in handle.await.unwrap() {
            result.expect("no insert should fail under contention");
        }
    }

    let all = test.store.all().await.unwrap();
    assert_eq!(all.len(), 100);
}

#[tokio::test]
async fn submitting_after_stop_reports_shutdown() {
    let test = open_test_catalog().await;
    test.queue.stop().await;

    let err = test
        .queue
        .submit(None, Box::new(|_conn| Box::pin(async { Ok(()) })))
        .await
        .expect_err("submitting after stop must fail");
    assert!(!err.is_contention());
    assert!(matches!(err, catalog_core::error::CoreError::Shutdown(_)));
}

#[tokio::test]
async fn a_queue_that_was_never_started_rejects_submissions() {
    let conn = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
    let queue = WriteQueue::new(conn, Default::default());
    let result = queue
        .submit(None, Box::new(|_conn| Box::pin(async { Ok(()) })))
        .await;
    assert!(result.is_err());
}
