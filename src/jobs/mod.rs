//! Long-running index/classifier job lifecycle:
//! `pending -> running -> (completed | failed | cancelled)`, with
//! `pending -> paused -> running` also allowed. `completed_at` is set iff
//! the job reaches a terminal state (I7), and `started_at <= completed_at`
//! (I8) by construction, since a job can only complete after it starts.

use crate::database::entities::{classifier_job, index_job};
use crate::error::{CoreError, CoreResult};
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set as ActiveSet, DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn parse(raw: &str) -> CoreResult<Self> {
        Ok(match raw {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => return Err(CoreError::invalid_input(format!("unknown job status '{other}'"))),
        })
    }
}

fn allowed_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    matches!(
        (from, to),
        (Pending, Running)
            | (Pending, Paused)
            | (Paused, Running)
            | (Running, Paused)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Cancelled)
            | (Pending, Cancelled)
            | (Paused, Cancelled)
    )
}

pub struct IndexJobStore {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
}

impl IndexJobStore {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self { conn, queue }
    }

    pub async fn create(&self, id: &str, root_path: &str) -> CoreResult<index_job::Model> {
        let (id, root_path) = (id.to_string(), root_path.to_string());
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let active = index_job::ActiveModel {
                        id: ActiveSet(id),
                        root_path: ActiveSet(root_path),
                        status: ActiveSet(JobStatus::Pending.as_str().to_string()),
                        progress: ActiveSet(0),
                        started_at: ActiveSet(None),
                        completed_at: ActiveSet(None),
                        error: ActiveSet(None),
                        metadata: ActiveSet(None),
                        created_at: ActiveSet(now),
                        updated_at: ActiveSet(now),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn get(&self, id: &str) -> CoreResult<Option<index_job::Model>> {
        Ok(index_job::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await?)
    }

    pub async fn list(&self) -> CoreResult<Vec<index_job::Model>> {
        Ok(index_job::Entity::find().all(&self.conn).await?)
    }

    pub async fn transition(&self, id: &str, to: JobStatus) -> CoreResult<index_job::Model> {
        let id = id.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let job = index_job::Entity::find_by_id(id.clone())
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("index job '{id}'")))?;
                    let from = JobStatus::parse(&job.status)?;
                    if !allowed_transition(from, to) {
                        return Err(CoreError::constraint(format!(
                            "index job '{id}': invalid transition {from:?} -> {to:?}"
                        )));
                    }

                    let already_started = job.started_at.is_some();
                    let mut active: index_job::ActiveModel = job.into();
                    active.status = ActiveSet(to.as_str().to_string());
                    active.updated_at = ActiveSet(Utc::now());
                    if to == JobStatus::Running && !already_started {
                        active.started_at = ActiveSet(Some(Utc::now()));
                    }
                    if to.is_terminal() {
                        active.completed_at = ActiveSet(Some(Utc::now()));
                    }
                    Ok(active.update(txn).await?)
                })
            })
            .await
    }

    pub async fn set_error(&self, id: &str, error: &str) -> CoreResult<index_job::Model> {
        let (id, error) = (id.to_string(), error.to_string());
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let job = index_job::Entity::find_by_id(id.clone())
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("index job '{id}'")))?;
                    let mut active: index_job::ActiveModel = job.into();
                    active.error = ActiveSet(Some(error));
                    active.status = ActiveSet(JobStatus::Failed.as_str().to_string());
                    active.completed_at = ActiveSet(Some(Utc::now()));
                    active.updated_at = ActiveSet(Utc::now());
                    Ok(active.update(txn).await?)
                })
            })
            .await
    }
}

pub struct ClassifierJobStore {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
}

impl ClassifierJobStore {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self { conn, queue }
    }

    pub async fn create(
        &self,
        id: &str,
        resource_url: Option<String>,
        local_path: &str,
        artifact_types: &[String],
    ) -> CoreResult<classifier_job::Model> {
        let (id, local_path) = (id.to_string(), local_path.to_string());
        let artifact_types = serde_json::to_string(artifact_types)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize artifact types: {e}")))?;
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let active = classifier_job::ActiveModel {
                        id: ActiveSet(id),
                        resource_url: ActiveSet(resource_url),
                        local_path: ActiveSet(local_path),
                        artifact_types: ActiveSet(artifact_types),
                        status: ActiveSet(JobStatus::Pending.as_str().to_string()),
                        progress: ActiveSet(0),
                        started_at: ActiveSet(None),
                        completed_at: ActiveSet(None),
                        error: ActiveSet(None),
                        result: ActiveSet(None),
                        created_at: ActiveSet(now),
                        updated_at: ActiveSet(now),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn get(&self, id: &str) -> CoreResult<Option<classifier_job::Model>> {
        Ok(classifier_job::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await?)
    }

    pub async fn list(&self) -> CoreResult<Vec<classifier_job::Model>> {
        Ok(classifier_job::Entity::find().all(&self.conn).await?)
    }

    pub async fn transition(&self, id: &str, to: JobStatus) -> CoreResult<classifier_job::Model> {
        let id = id.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let job = classifier_job::Entity::find_by_id(id.clone())
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("classifier job '{id}'")))?;
                    let from = JobStatus::parse(&job.status)?;
                    if !allowed_transition(from, to) {
                        return Err(CoreError::constraint(format!(
                            "classifier job '{id}': invalid transition {from:?} -> {to:?}"
                        )));
                    }

                    let already_started = job.started_at.is_some();
                    let mut active: classifier_job::ActiveModel = job.into();
                    active.status = ActiveSet(to.as_str().to_string());
                    active.updated_at = ActiveSet(Utc::now());
                    if to == JobStatus::Running && !already_started {
                        active.started_at = ActiveSet(Some(Utc::now()));
                    }
                    if to.is_terminal() {
                        active.completed_at = ActiveSet(Some(Utc::now()));
                    }
                    Ok(active.update(txn).await?)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_matches_spec_lifecycle() {
        use JobStatus::*;
        assert!(allowed_transition(Pending, Running));
        assert!(allowed_transition(Pending, Paused));
        assert!(allowed_transition(Paused, Running));
        assert!(allowed_transition(Running, Completed));
        assert!(!allowed_transition(Completed, Running));
        assert!(!allowed_transition(Pending, Completed));
    }
}
