//! Rules and plans end to end: condition match and resource-set dispatch.

mod helpers;

use catalog_core::plans::{PlanMode, PlanSources};
use catalog_core::query::FileFilter;
use catalog_core::rules::Outcome;
use helpers::{file_entry, open_test_catalog};

#[tokio::test]
async fn a_matching_rule_adds_the_candidate_to_its_bound_resource_set() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/photo.jpg", None, 10, 0, 0, 1)).await.unwrap();
    let candidate = test.store.get_by_path("/r/photo.jpg").await.unwrap().unwrap();

    let condition = FileFilter {
        extensions: vec!["jpg".to_string()],
        ..Default::default()
    };
    let outcome = Outcome::AddToResourceSet {
        resource_set: "photos".to_string(),
    };
    test.rules.create_rule("jpg-rule", 10, &condition, &outcome).await.unwrap();

    let executions = test.rules.evaluate(&candidate).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert!(executions[0].matched);
    assert_eq!(executions[0].status, "success");

    let members = test.resource_sets.members("photos").await.unwrap();
    assert_eq!(members, vec!["/r/photo.jpg".to_string()]);
    assert!(test.resource_sets.get_set("photos").await.unwrap().is_some());
}

#[tokio::test]
async fn a_non_matching_rule_records_an_execution_without_dispatching() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/doc.txt", None, 10, 0, 0, 1)).await.unwrap();
    let candidate = test.store.get_by_path("/r/doc.txt").await.unwrap().unwrap();

    let condition = FileFilter {
        extensions: vec!["jpg".to_string()],
        ..Default::default()
    };
    let outcome = Outcome::AddToResourceSet {
        resource_set: "photos".to_string(),
    };
    test.rules.create_rule("jpg-rule", 10, &condition, &outcome).await.unwrap();

    let executions = test.rules.evaluate(&candidate).await.unwrap();
    assert_eq!(executions.len(), 1);
    assert!(!executions[0].matched);
    assert!(test.resource_sets.get_set("photos").await.unwrap().is_none());
}

#[tokio::test]
async fn rules_are_evaluated_in_priority_order_and_all_are_audited() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/a.jpg", None, 10, 0, 0, 1)).await.unwrap();
    let candidate = test.store.get_by_path("/r/a.jpg").await.unwrap().unwrap();

    let jpg = FileFilter {
        extensions: vec!["jpg".to_string()],
        ..Default::default()
    };
    let everything = FileFilter::default();

    test.rules
        .create_rule("low-priority-catchall", 1, &everything, &Outcome::AddToResourceSet {
            resource_set: "all".to_string(),
        })
        .await
        .unwrap();
    test.rules
        .create_rule("high-priority-jpg", 10, &jpg, &Outcome::AddToResourceSet {
            resource_set: "photos".to_string(),
        })
        .await
        .unwrap();

    let rules = test.rules.list_enabled_by_priority().await.unwrap();
    assert_eq!(rules[0].name, "high-priority-jpg");
    assert_eq!(rules[1].name, "low-priority-catchall");

    let executions = test.rules.evaluate(&candidate).await.unwrap();
    assert_eq!(executions.len(), 2);
    assert!(executions.iter().all(|e| e.matched));
}

#[tokio::test]
async fn a_oneshot_plan_runs_once_then_disables_itself() {
    let test = open_test_catalog().await;
    test.store.upsert_entry(file_entry("/r/a.mp4", None, 10, 0, 0, 1)).await.unwrap();
    test.store.upsert_entry(file_entry("/r/b.txt", None, 10, 0, 0, 1)).await.unwrap();

    let sources = PlanSources {
        roots: vec!["/r".to_string()],
    };
    let condition = FileFilter {
        extensions: vec!["mp4".to_string()],
        ..Default::default()
    };
    let outcomes = vec![Outcome::AddToResourceSet {
        resource_set: "videos".to_string(),
    }];
    test.plans
        .create_plan("sweep-videos", PlanMode::Oneshot, &sources, Some(&condition), &outcomes)
        .await
        .unwrap();

    let execution = test.plans.run("sweep-videos").await.unwrap();
    assert_eq!(execution.status, "success");

    let members = test.resource_sets.members("videos").await.unwrap();
    assert_eq!(members, vec!["/r/a.mp4".to_string()]);

    let plan = test.plans.get("sweep-videos").await.unwrap().unwrap();
    assert_eq!(plan.status, "disabled");

    let err = test.plans.run("sweep-videos").await.expect_err("disabled plans cannot run");
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn a_paused_plan_cannot_be_run_until_resumed() {
    let test = open_test_catalog().await;
    let sources = PlanSources {
        roots: vec!["/r".to_string()],
    };
    test.plans
        .create_plan("idle", PlanMode::Continuous, &sources, None, &[])
        .await
        .unwrap();

    test.plans.pause("idle").await.unwrap();
    assert!(test.plans.run("idle").await.is_err());

    test.plans.resume("idle").await.unwrap();
    let execution = test.plans.run("idle").await.unwrap();
    assert_eq!(execution.status, "success");

    // Continuous plans stay active across a successful run.
    let plan = test.plans.get("idle").await.unwrap().unwrap();
    assert_eq!(plan.status, "active");
}
