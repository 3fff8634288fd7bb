//! Resource-set DAG: diamond aggregation, cycle rejection, membership
//! idempotence, edge round-trips.

mod helpers;

use catalog_core::resource_set::Metric;
use helpers::{file_entry, open_test_catalog};

#[tokio::test]
async fn diamond_aggregation_counts_shared_members_once() {
    let test = open_test_catalog().await;
    let store = &test.store;
    let sets = &test.resource_sets;

    store
        .upsert_entry(file_entry("/shared", None, 500, 0, 0, 1))
        .await
        .unwrap();
    store
        .upsert_entry(file_entry("/only-b", None, 100, 0, 0, 1))
        .await
        .unwrap();

    for name in ["A", "B", "C", "D"] {
        sets.create_set(name, None).await.unwrap();
    }
    sets.add_edge("A", "B").await.unwrap();
    sets.add_edge("A", "C").await.unwrap();
    sets.add_edge("B", "D").await.unwrap();
    sets.add_edge("C", "D").await.unwrap();

    sets.add("B", &["/shared".to_string(), "/only-b".to_string()]).await.unwrap();
    sets.add("C", &["/shared".to_string()]).await.unwrap();

    let sum = sets.resource_sum("A", Metric::Size, true).await.unwrap();
    assert_eq!(sum.value, 600);
}

#[tokio::test]
async fn adding_an_edge_that_would_close_a_cycle_is_rejected() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    for name in ["X", "Y", "Z"] {
        sets.create_set(name, None).await.unwrap();
    }
    sets.add_edge("X", "Y").await.unwrap();
    sets.add_edge("Y", "Z").await.unwrap();

    let err = sets
        .add_edge("Z", "X")
        .await
        .expect_err("Z -> X would close X -> Y -> Z -> X");
    assert!(err.is_cycle());

    // Graph unchanged: Z still has no children.
    assert!(sets.get_children("Z").await.unwrap().is_empty());
}

#[tokio::test]
async fn add_edge_is_idempotent_and_remove_edge_restores_the_prior_graph() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    sets.create_set("P", None).await.unwrap();
    sets.create_set("C", None).await.unwrap();

    sets.add_edge("P", "C").await.unwrap();
    sets.add_edge("P", "C").await.unwrap();
    assert_eq!(sets.get_children("P").await.unwrap().len(), 1);

    sets.remove_edge("P", "C").await.unwrap();
    assert!(sets.get_children("P").await.unwrap().is_empty());
}

#[tokio::test]
async fn removing_a_missing_edge_is_a_silent_no_op() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    sets.create_set("P", None).await.unwrap();
    sets.create_set("C", None).await.unwrap();

    sets.remove_edge("P", "C").await.expect("missing edge removal is not an error");
}

#[tokio::test]
async fn adding_the_same_membership_twice_leaves_exactly_one_row() {
    let test = open_test_catalog().await;
    let store = &test.store;
    let sets = &test.resource_sets;

    store.upsert_entry(file_entry("/f", None, 10, 0, 0, 1)).await.unwrap();
    sets.create_set("S", None).await.unwrap();

    sets.add("S", &["/f".to_string()]).await.unwrap();
    sets.add("S", &["/f".to_string()]).await.unwrap();

    assert_eq!(sets.members("S").await.unwrap(), vec!["/f".to_string()]);
}

#[tokio::test]
async fn removing_a_non_member_is_a_no_op() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    sets.create_set("S", None).await.unwrap();
    sets.remove("S", &["/never-added".to_string()]).await.unwrap();
    assert!(sets.members("S").await.unwrap().is_empty());
}

#[tokio::test]
async fn resource_sum_on_an_empty_set_is_zero_with_an_empty_breakdown() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    sets.create_set("Empty", None).await.unwrap();
    let sum = sets.resource_sum("Empty", Metric::Size, true).await.unwrap();
    assert_eq!(sum.value, 0);
    assert_eq!(sum.breakdown.len(), 1);
    assert_eq!(sum.breakdown[0].value, 0);
}

#[tokio::test]
async fn a_set_cannot_be_its_own_parent() {
    let test = open_test_catalog().await;
    let sets = &test.resource_sets;

    sets.create_set("S", None).await.unwrap();
    let err = sets.add_edge("S", "S").await.expect_err("self-edge is always a cycle");
    assert!(err.is_cycle());
}
