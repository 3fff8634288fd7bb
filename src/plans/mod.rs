//! Plans: higher-level automation over sources × conditions × outcomes,
//! mirroring [`crate::rules`] at coarser granularity. A `oneshot` plan runs
//! once and moves to `disabled`; a `continuous` plan stays `active` and is
//! expected to be re-run by a host scheduler (out of scope for the core —
//! it only executes a single pass per call to [`PlanEngine::run`]).

use crate::database::entities::{entry, plan, plan_execution, plan_outcome};
use crate::error::{CoreError, CoreResult};
use crate::query::{execute_file_filter, FileFilter};
use crate::resource_set::ResourceSetStore;
use crate::rules::{matches_filter, Outcome};
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set as ActiveSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    Oneshot,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Active,
    Paused,
    Disabled,
}

impl PlanMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Oneshot => "oneshot",
            Self::Continuous => "continuous",
        }
    }
}

impl PlanStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Disabled => "disabled",
        }
    }

    fn parse(raw: &str) -> CoreResult<Self> {
        Ok(match raw {
            "active" => Self::Active,
            "paused" => Self::Paused,
            "disabled" => Self::Disabled,
            other => return Err(CoreError::invalid_input(format!("unknown plan status '{other}'"))),
        })
    }
}

/// A plan's sources: each is a root path the plan scans candidate entries
/// from (a catalog subtree prefix, matching `FileFilter::path` semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSources {
    pub roots: Vec<String>,
}

pub struct PlanEngine {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
    resource_sets: ResourceSetStore,
}

impl PlanEngine {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        let resource_sets = ResourceSetStore::new(conn.clone(), queue.clone());
        Self {
            conn,
            queue,
            resource_sets,
        }
    }

    pub async fn create_plan(
        &self,
        name: &str,
        mode: PlanMode,
        sources: &PlanSources,
        conditions: Option<&FileFilter>,
        outcomes: &[Outcome],
    ) -> CoreResult<plan::Model> {
        let name = name.to_string();
        let sources_json = serde_json::to_string(sources)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize sources: {e}")))?;
        let conditions_json = conditions
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize conditions: {e}")))?;
        let outcomes_json = serde_json::to_string(outcomes)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize outcomes: {e}")))?;
        let mode_str = mode.as_str().to_string();

        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let active = plan::ActiveModel {
                        id: Default::default(),
                        name: ActiveSet(name),
                        mode: ActiveSet(mode_str),
                        status: ActiveSet(PlanStatus::Active.as_str().to_string()),
                        sources_json: ActiveSet(sources_json),
                        conditions_json: ActiveSet(conditions_json),
                        outcomes_json: ActiveSet(outcomes_json),
                        last_run_at: ActiveSet(None),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn get(&self, name: &str) -> CoreResult<Option<plan::Model>> {
        Ok(plan::Entity::find()
            .filter(plan::Column::Name.eq(name))
            .one(&self.conn)
            .await?)
    }

    pub async fn list(&self) -> CoreResult<Vec<plan::Model>> {
        Ok(plan::Entity::find().all(&self.conn).await?)
    }

    pub async fn pause(&self, name: &str) -> CoreResult<plan::Model> {
        self.set_status(name, PlanStatus::Paused).await
    }

    pub async fn disable(&self, name: &str) -> CoreResult<plan::Model> {
        self.set_status(name, PlanStatus::Disabled).await
    }

    pub async fn resume(&self, name: &str) -> CoreResult<plan::Model> {
        self.set_status(name, PlanStatus::Active).await
    }

    async fn set_status(&self, name: &str, status: PlanStatus) -> CoreResult<plan::Model> {
        let name = name.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let existing = plan::Entity::find()
                        .filter(plan::Column::Name.eq(name.clone()))
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("plan '{name}'")))?;
                    let mut active: plan::ActiveModel = existing.into();
                    active.status = ActiveSet(status.as_str().to_string());
                    Ok(active.update(txn).await?)
                })
            })
            .await
    }

    /// Run one pass of `name`: gather candidates from its sources, apply
    /// its optional condition, dispatch every outcome for each match, and
    /// record the execution/outcome audit trail. A `oneshot` plan is moved
    /// to `disabled` after a successful run.
    pub async fn run(&self, name: &str) -> CoreResult<plan_execution::Model> {
        let plan = self
            .get(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("plan '{name}'")))?;

        if PlanStatus::parse(&plan.status)? != PlanStatus::Active {
            return Err(CoreError::constraint(format!(
                "plan '{name}' is not active (status: {})",
                plan.status
            )));
        }

        let result = self.run_inner(&plan).await;
        let (status, error_message) = match &result {
            Ok(_) => ("success".to_string(), None),
            Err(e) => ("error".to_string(), Some(e.to_string())),
        };

        let plan_id = plan.id;
        let execution = self
            .queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let active = plan_execution::ActiveModel {
                        id: Default::default(),
                        plan_id: ActiveSet(plan_id),
                        executed_at: ActiveSet(Utc::now()),
                        status: ActiveSet(status),
                        error_message: ActiveSet(error_message),
                    };
                    let execution = active.insert(txn).await?;

                    let stored = plan::Entity::find_by_id(plan_id)
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("plan id {plan_id}")))?;
                    let mode_is_oneshot = stored.mode == PlanMode::Oneshot.as_str();
                    let mut active: plan::ActiveModel = stored.into();
                    active.last_run_at = ActiveSet(Some(Utc::now()));
                    if mode_is_oneshot {
                        active.status = ActiveSet(PlanStatus::Disabled.as_str().to_string());
                    }
                    active.update(txn).await?;
                    Ok(execution)
                })
            })
            .await?;

        for outcome_set in result?.into_iter() {
            self.record_outcome(&execution, &outcome_set.0, &outcome_set.1).await?;
        }
        Ok(execution)
    }

    /// Returns, per matching candidate, the `(resource_set_name, action)`
    /// pairs dispatched for it, without recording the audit rows yet — the
    /// caller in [`Self::run`] needs the `plan_execution` row's id first.
    async fn run_inner(&self, plan: &plan::Model) -> CoreResult<Vec<(String, String)>> {
        let sources: PlanSources = serde_json::from_str(&plan.sources_json)
            .map_err(|e| CoreError::invalid_input(format!("corrupt plan sources: {e}")))?;
        let conditions: Option<FileFilter> = plan
            .conditions_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| CoreError::invalid_input(format!("corrupt plan conditions: {e}")))?;
        let outcomes: Vec<Outcome> = serde_json::from_str(&plan.outcomes_json)
            .map_err(|e| CoreError::invalid_input(format!("corrupt plan outcomes: {e}")))?;

        let mut candidates: Vec<entry::Model> = Vec::new();
        for root in &sources.roots {
            let filter = FileFilter {
                path: Some(root.clone()),
                ..Default::default()
            };
            candidates.extend(execute_file_filter(&self.conn, &filter).await?);
        }

        let mut dispatched = Vec::new();
        for candidate in &candidates {
            let is_match = match &conditions {
                Some(filter) => matches_filter(candidate, filter),
                None => true,
            };
            if !is_match {
                continue;
            }
            for outcome in &outcomes {
                for set_name in flatten_resource_sets(outcome) {
                    let set = match self.resource_sets.get_set(&set_name).await? {
                        Some(set) => set,
                        None => {
                            self.resource_sets
                                .create_set(&set_name, Some(format!("auto-created by plan '{}'", plan.name)))
                                .await?
                        }
                    };
                    self.resource_sets.add(&set.name, &[candidate.path.clone()]).await?;
                    dispatched.push((set.name.clone(), action_name(outcome).to_string()));
                }
            }
        }
        Ok(dispatched)
    }

    async fn record_outcome(
        &self,
        execution: &plan_execution::Model,
        resource_set_name: &str,
        action: &str,
    ) -> CoreResult<()> {
        let set = self
            .resource_sets
            .get_set(resource_set_name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{resource_set_name}'")))?;
        let execution_id = execution.id;
        let action = action.to_string();
        self.queue
            .submit(
                None,
                Box::new(move |conn| {
                    Box::pin(async move {
                        let active = plan_outcome::ActiveModel {
                            id: Default::default(),
                            plan_execution_id: ActiveSet(execution_id),
                            resource_set_id: ActiveSet(set.id),
                            action: ActiveSet(action),
                            status: ActiveSet("success".to_string()),
                            error_message: ActiveSet(None),
                            created_at: ActiveSet(Utc::now()),
                        };
                        active.insert(conn).await?;
                        Ok(())
                    })
                }),
            )
            .await
    }
}

fn flatten_resource_sets(outcome: &Outcome) -> Vec<String> {
    match outcome {
        Outcome::AddToResourceSet { resource_set } | Outcome::GenerateThumbnail { resource_set } => {
            vec![resource_set.clone()]
        }
        Outcome::Chained { steps } => steps.iter().flat_map(flatten_resource_sets).collect(),
    }
}

fn action_name(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::AddToResourceSet { .. } => "add_to_resource_set",
        Outcome::GenerateThumbnail { .. } => "generate_thumbnail",
        Outcome::Chained { .. } => "chained",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_mode_round_trips_through_str() {
        assert_eq!(PlanMode::Oneshot.as_str(), "oneshot");
        assert_eq!(PlanMode::Continuous.as_str(), "continuous");
    }

    #[test]
    fn plan_status_parse_rejects_unknown() {
        assert!(PlanStatus::parse("active").is_ok());
        assert!(PlanStatus::parse("bogus").is_err());
    }
}
