//! Condition-matching rules that dispatch outcomes against resource sets.
//!
//! Evaluation orders enabled rules by `priority DESC` (§4.8). A rule
//! matches a candidate entry via its `condition_json` (reusing
//! [`crate::query::FileFilter`] as the condition language, since both are
//! "does this entry satisfy a declarative predicate" problems); on match,
//! its `outcome_json` dispatches a named action. Every outcome is
//! auto-bound to a resource set via [`RuleEngine::ensure_resource_set_for_outcome`]:
//! if the set doesn't exist, it's created with a description linking it to
//! the rule that produced it.

use crate::database::entities::{entry, resource_set, rule, rule_execution, rule_outcome};
use crate::error::{CoreError, CoreResult};
use crate::query::FileFilter;
use crate::resource_set::ResourceSetStore;
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set as ActiveSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A rule's outcome: the action dispatched on a match, always bound to a
/// named resource set per `spec.md` §3 "Outcome".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    AddToResourceSet { resource_set: String },
    GenerateThumbnail { resource_set: String },
    Chained { steps: Vec<Outcome> },
}

impl Outcome {
    /// The resource set every leaf of this outcome (including nested
    /// `Chained` steps) is bound to is not necessarily singular for
    /// `Chained`, so callers fetch the set(s) actually touched via
    /// [`Self::resource_sets`].
    fn resource_sets(&self) -> Vec<&str> {
        match self {
            Outcome::AddToResourceSet { resource_set } | Outcome::GenerateThumbnail { resource_set } => {
                vec![resource_set.as_str()]
            }
            Outcome::Chained { steps } => steps.iter().flat_map(|s| s.resource_sets()).collect(),
        }
    }

    fn action_name(&self) -> &'static str {
        match self {
            Outcome::AddToResourceSet { .. } => "add_to_resource_set",
            Outcome::GenerateThumbnail { .. } => "generate_thumbnail",
            Outcome::Chained { .. } => "chained",
        }
    }
}

pub struct RuleEngine {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
    resource_sets: ResourceSetStore,
}

impl RuleEngine {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        let resource_sets = ResourceSetStore::new(conn.clone(), queue.clone());
        Self {
            conn,
            queue,
            resource_sets,
        }
    }

    pub async fn create_rule(
        &self,
        name: &str,
        priority: i32,
        condition: &FileFilter,
        outcome: &Outcome,
    ) -> CoreResult<rule::Model> {
        let name = name.to_string();
        let condition_json = serde_json::to_string(condition)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize condition: {e}")))?;
        let outcome_json = serde_json::to_string(outcome)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize outcome: {e}")))?;
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let active = rule::ActiveModel {
                        id: Default::default(),
                        name: ActiveSet(name),
                        enabled: ActiveSet(true),
                        priority: ActiveSet(priority),
                        condition_json: ActiveSet(condition_json),
                        outcome_json: ActiveSet(outcome_json),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn list_enabled_by_priority(&self) -> CoreResult<Vec<rule::Model>> {
        Ok(rule::Entity::find()
            .filter(rule::Column::Enabled.eq(true))
            .order_by_desc(rule::Column::Priority)
            .all(&self.conn)
            .await?)
    }

    /// If a resource set named `name` doesn't exist yet, create it with a
    /// description linking it to the originating rule; otherwise reuse it.
    pub async fn ensure_resource_set_for_outcome(
        &self,
        name: &str,
        rule_name: &str,
    ) -> CoreResult<resource_set::Model> {
        if let Some(existing) = self.resource_sets.get_set(name).await? {
            return Ok(existing);
        }
        self.resource_sets
            .create_set(name, Some(format!("auto-created by rule '{rule_name}'")))
            .await
    }

    /// Evaluate every enabled rule, in priority order, against `candidate`,
    /// dispatching outcomes for every match and recording the full audit
    /// trail (one [`rule_execution::Model`] per rule, one
    /// [`rule_outcome::Model`] per dispatched action).
    pub async fn evaluate(&self, candidate: &entry::Model) -> CoreResult<Vec<rule_execution::Model>> {
        let rules = self.list_enabled_by_priority().await?;
        let mut executions = Vec::with_capacity(rules.len());
        for rule in rules {
            executions.push(self.evaluate_one(&rule, candidate).await?);
        }
        Ok(executions)
    }

    async fn evaluate_one(&self, rule: &rule::Model, candidate: &entry::Model) -> CoreResult<rule_execution::Model> {
        let condition: CoreResult<FileFilter> = serde_json::from_str(&rule.condition_json)
            .map_err(|e| CoreError::invalid_input(format!("corrupt rule condition: {e}")));

        let matched = match &condition {
            Ok(filter) => matches_filter(candidate, filter),
            Err(_) => false,
        };

        let (status, error_message) = match &condition {
            Ok(_) => ("success".to_string(), None),
            Err(e) => ("error".to_string(), Some(e.to_string())),
        };

        let rule_id = rule.id;
        let entry_path = candidate.path.clone();
        let execution = self
            .queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let active = rule_execution::ActiveModel {
                        id: Default::default(),
                        rule_id: ActiveSet(rule_id),
                        entry_path: ActiveSet(entry_path),
                        matched: ActiveSet(matched),
                        executed_at: ActiveSet(Utc::now()),
                        status: ActiveSet(status),
                        error_message: ActiveSet(error_message),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await?;

        if matched {
            if let Ok(outcome) = serde_json::from_str::<Outcome>(&rule.outcome_json) {
                self.dispatch_outcome(&execution, &rule.name, &outcome, candidate).await?;
            }
        }

        Ok(execution)
    }

    async fn dispatch_outcome(
        &self,
        execution: &rule_execution::Model,
        rule_name: &str,
        outcome: &Outcome,
        candidate: &entry::Model,
    ) -> CoreResult<()> {
        for set_name in outcome.resource_sets() {
            let bound_set = self.ensure_resource_set_for_outcome(set_name, rule_name).await;
            let (status, error_message, resource_set_id) = match &bound_set {
                Ok(set) => ("success".to_string(), None, set.id),
                Err(e) => ("error".to_string(), Some(e.to_string()), 0),
            };

            if let Ok(set) = &bound_set {
                self.resource_sets.add(&set.name, &[candidate.path.clone()]).await?;
            }

            // `resource_set_id` is required and non-zero (rule_outcomes
            // schema CHECK); a failed bind has nothing valid to record
            // against and is logged instead of audited as a row.
            if resource_set_id == 0 {
                tracing::warn!(
                    rule = %rule_name,
                    error = ?error_message,
                    "skipping rule outcome audit row: no resource set id to bind to"
                );
                continue;
            }

            let execution_id = execution.id;
            let action = outcome.action_name().to_string();
            self.queue
                .submit(
                    None,
                    Box::new(move |conn| {
                        Box::pin(async move {
                            let active = rule_outcome::ActiveModel {
                                id: Default::default(),
                                rule_execution_id: ActiveSet(execution_id),
                                resource_set_id: ActiveSet(resource_set_id),
                                action: ActiveSet(action),
                                status: ActiveSet(status),
                                error_message: ActiveSet(error_message),
                                created_at: ActiveSet(Utc::now()),
                            };
                            active.insert(conn).await?;
                            Ok(())
                        })
                    }),
                )
                .await?;
        }
        Ok(())
    }
}

/// Shared by rules and plans: does `candidate` satisfy `filter`'s
/// predicates? In-process evaluation against a single row, reusing the
/// same field semantics [`crate::query::execute_file_filter`] applies at
/// the store level.
pub fn matches_filter(candidate: &entry::Model, filter: &FileFilter) -> bool {
    if let Some(path) = &filter.path {
        if candidate.path != *path && !candidate.path.starts_with(&format!("{path}/")) {
            return false;
        }
    }
    if !filter.extensions.is_empty() {
        let has_ext = filter
            .extensions
            .iter()
            .any(|ext| candidate.path.ends_with(&format!(".{}", ext.trim_start_matches('.'))));
        if !has_ext {
            return false;
        }
    }
    if let Some(min) = filter.min_size {
        if candidate.size < min {
            return false;
        }
    }
    if let Some(max) = filter.max_size {
        if candidate.size > max {
            return false;
        }
    }
    if let Some(needle) = &filter.name_contains {
        if !candidate.path.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(needle) = &filter.path_contains {
        if !candidate.path.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(pattern) = &filter.pattern {
        match regex::Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(&candidate.path) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(path: &str, size: i64) -> entry::Model {
        entry::Model {
            id: 1,
            path: path.to_string(),
            parent: None,
            size,
            kind: 0,
            ctime: 0,
            mtime: 0,
            last_scanned: 0,
            dirty: false,
            blocks: None,
        }
    }

    #[test]
    fn extension_filter_matches_case_sensitively() {
        let filter = FileFilter {
            extensions: vec!["jpg".to_string()],
            ..Default::default()
        };
        assert!(matches_filter(&sample_entry("/a/b.jpg", 10), &filter));
        assert!(!matches_filter(&sample_entry("/a/b.png", 10), &filter));
    }

    #[test]
    fn size_bounds_are_inclusive() {
        let filter = FileFilter {
            min_size: Some(100),
            max_size: Some(200),
            ..Default::default()
        };
        assert!(matches_filter(&sample_entry("/a", 100), &filter));
        assert!(matches_filter(&sample_entry("/a", 200), &filter));
        assert!(!matches_filter(&sample_entry("/a", 201), &filter));
    }

    #[test]
    fn outcome_resource_sets_flattens_chains() {
        let outcome = Outcome::Chained {
            steps: vec![
                Outcome::AddToResourceSet {
                    resource_set: "a".to_string(),
                },
                Outcome::GenerateThumbnail {
                    resource_set: "b".to_string(),
                },
            ],
        };
        assert_eq!(outcome.resource_sets(), vec!["a", "b"]);
    }
}
