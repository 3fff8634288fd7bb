//! The resource-set DAG: a multi-parent grouping of catalog entries.
//!
//! Sets are related by [`ResourceSetEdge`](crate::database::entities::resource_set_edge)
//! rows (`parent_id -> child_id`); a set may have several parents (I6), so
//! the edge relation is not a tree, but it must stay acyclic (I5). Cycle
//! detection happens at edge-insertion time: adding `parent -> child` would
//! close a cycle iff `parent` is already reachable by following existing
//! edges forward from `child` (i.e. `parent` is already a descendant of
//! `child`) — see [`would_cycle`].
//!
//! The naming note in `spec.md` §9 ("the source has two parallel naming
//! conventions... `AddResourceSetChild` and `AddResourceSetEdge`") is
//! resolved here by keeping one implementation, [`ResourceSetStore::add_edge`],
//! with [`ResourceSetStore::add_resource_set_child`] as a thin alias.

use crate::database::entities::{entry, resource_set, resource_set_edge, resource_set_membership};
use crate::error::{CoreError, CoreResult};
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set as ActiveSet, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter,
};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Size,
    Count,
    CountFiles,
    CountDirectories,
}

#[derive(Debug, Clone)]
pub struct SetContribution {
    pub set_name: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceSum {
    pub value: i64,
    pub breakdown: Vec<SetContribution>,
}

pub struct ResourceSetStore {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
}

impl ResourceSetStore {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self { conn, queue }
    }

    // ---- set lifecycle -------------------------------------------------

    pub async fn create_set(
        &self,
        name: &str,
        description: Option<String>,
    ) -> CoreResult<resource_set::Model> {
        let name = name.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let active = resource_set::ActiveModel {
                        id: Default::default(),
                        name: ActiveSet(name),
                        description: ActiveSet(description),
                        created_at: ActiveSet(now),
                        updated_at: ActiveSet(now),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn get_set(&self, name: &str) -> CoreResult<Option<resource_set::Model>> {
        Ok(resource_set::Entity::find()
            .filter(resource_set::Column::Name.eq(name))
            .one(&self.conn)
            .await?)
    }

    pub async fn list_sets(&self) -> CoreResult<Vec<resource_set::Model>> {
        Ok(resource_set::Entity::find().all(&self.conn).await?)
    }

    pub async fn update_set(
        &self,
        name: &str,
        description: Option<String>,
    ) -> CoreResult<resource_set::Model> {
        let name = name.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let set = resource_set::Entity::find()
                        .filter(resource_set::Column::Name.eq(name.clone()))
                        .one(txn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
                    let mut active: resource_set::ActiveModel = set.into();
                    active.description = ActiveSet(description);
                    active.updated_at = ActiveSet(Utc::now());
                    Ok(active.update(txn).await?)
                })
            })
            .await
    }

    /// Cascades to edges and memberships via `ON DELETE CASCADE`.
    pub async fn delete_set(&self, name: &str) -> CoreResult<bool> {
        let name = name.to_string();
        self.queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    let result = resource_set::Entity::delete_many()
                        .filter(resource_set::Column::Name.eq(name))
                        .exec(conn)
                        .await?;
                    Ok(result.rows_affected > 0)
                })
            })
            .await
    }

    // ---- membership ------------------------------------------------------

    /// Add `paths` to `name`. Adding a path already a member is idempotent.
    /// Run under one transaction; bumps `updated_at`.
    pub async fn add(&self, name: &str, paths: &[String]) -> CoreResult<()> {
        let name = name.to_string();
        let paths = paths.to_vec();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let set = find_set_by_name(txn, &name).await?;
                    let now = Utc::now();
                    for path in paths {
                        let existing = resource_set_membership::Entity::find()
                            .filter(resource_set_membership::Column::SetId.eq(set.id))
                            .filter(resource_set_membership::Column::EntryPath.eq(path.clone()))
                            .one(txn)
                            .await?;
                        if existing.is_some() {
                            continue;
                        }
                        let active = resource_set_membership::ActiveModel {
                            set_id: ActiveSet(set.id),
                            entry_path: ActiveSet(path),
                            added_at: ActiveSet(now),
                        };
                        active.insert(txn).await?;
                    }
                    bump_updated_at(txn, set).await?;
                    Ok(())
                })
            })
            .await
    }

    /// Remove `paths` from `name`. Removing a non-member is a no-op.
    pub async fn remove(&self, name: &str, paths: &[String]) -> CoreResult<()> {
        let name = name.to_string();
        let paths = paths.to_vec();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let set = find_set_by_name(txn, &name).await?;
                    resource_set_membership::Entity::delete_many()
                        .filter(resource_set_membership::Column::SetId.eq(set.id))
                        .filter(resource_set_membership::Column::EntryPath.is_in(paths))
                        .exec(txn)
                        .await?;
                    bump_updated_at(txn, set).await?;
                    Ok(())
                })
            })
            .await
    }

    pub async fn members(&self, name: &str) -> CoreResult<Vec<String>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        Ok(resource_set_membership::Entity::find()
            .filter(resource_set_membership::Column::SetId.eq(set.id))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| m.entry_path)
            .collect())
    }

    // ---- DAG edges -------------------------------------------------------

    /// Alias of [`Self::add_edge`] kept for the source material's other name.
    pub async fn add_resource_set_child(&self, parent: &str, child: &str) -> CoreResult<()> {
        self.add_edge(parent, child).await
    }

    /// Rejected with a cycle error if `parent` is already reachable by
    /// walking forward from `child` (i.e. `parent` would become its own
    /// descendant). Rejected if either set is missing. Duplicate edges are
    /// no-ops.
    pub async fn add_edge(&self, parent: &str, child: &str) -> CoreResult<()> {
        let (parent, child) = (parent.to_string(), child.to_string());
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let parent_set = find_set_by_name(txn, &parent).await?;
                    let child_set = find_set_by_name(txn, &child).await?;

                    if parent_set.id == child_set.id {
                        return Err(CoreError::cycle(format!(
                            "'{parent}' cannot be its own parent"
                        )));
                    }

                    let existing = resource_set_edge::Entity::find()
                        .filter(resource_set_edge::Column::ParentId.eq(parent_set.id))
                        .filter(resource_set_edge::Column::ChildId.eq(child_set.id))
                        .one(txn)
                        .await?;
                    if existing.is_some() {
                        return Ok(());
                    }

                    if would_cycle(txn, parent_set.id, child_set.id).await? {
                        return Err(CoreError::cycle(format!(
                            "adding '{parent}' -> '{child}' would create a cycle"
                        )));
                    }

                    let active = resource_set_edge::ActiveModel {
                        parent_id: ActiveSet(parent_set.id),
                        child_id: ActiveSet(child_set.id),
                        added_at: ActiveSet(Utc::now()),
                    };
                    active.insert(txn).await?;
                    Ok(())
                })
            })
            .await
    }

    /// No-op if the edge is absent (`RemoveResourceSetChild` reading of the
    /// two source behaviors; see `DESIGN.md`).
    pub async fn remove_edge(&self, parent: &str, child: &str) -> CoreResult<()> {
        let (parent, child) = (parent.to_string(), child.to_string());
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let parent_set = find_set_by_name(txn, &parent).await?;
                    let child_set = find_set_by_name(txn, &child).await?;
                    resource_set_edge::Entity::delete_many()
                        .filter(resource_set_edge::Column::ParentId.eq(parent_set.id))
                        .filter(resource_set_edge::Column::ChildId.eq(child_set.id))
                        .exec(txn)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    pub async fn get_children(&self, name: &str) -> CoreResult<Vec<resource_set::Model>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        let child_ids: Vec<i32> = resource_set_edge::Entity::find()
            .filter(resource_set_edge::Column::ParentId.eq(set.id))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|e| e.child_id)
            .collect();
        Ok(resource_set::Entity::find()
            .filter(resource_set::Column::Id.is_in(child_ids))
            .all(&self.conn)
            .await?)
    }

    pub async fn get_parents(&self, name: &str) -> CoreResult<Vec<resource_set::Model>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        let parent_ids: Vec<i32> = resource_set_edge::Entity::find()
            .filter(resource_set_edge::Column::ChildId.eq(set.id))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|e| e.parent_id)
            .collect();
        Ok(resource_set::Entity::find()
            .filter(resource_set::Column::Id.is_in(parent_ids))
            .all(&self.conn)
            .await?)
    }

    /// Transitive closure of children, excluding `name` itself.
    pub async fn get_descendants(&self, name: &str) -> CoreResult<Vec<resource_set::Model>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        let ids = reachable_ids(&self.conn, set.id, Direction::Forward).await?;
        Ok(resource_set::Entity::find()
            .filter(resource_set::Column::Id.is_in(ids))
            .all(&self.conn)
            .await?)
    }

    /// Transitive closure of parents, excluding `name` itself.
    pub async fn get_ancestors(&self, name: &str) -> CoreResult<Vec<resource_set::Model>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        let ids = reachable_ids(&self.conn, set.id, Direction::Backward).await?;
        Ok(resource_set::Entity::find()
            .filter(resource_set::Column::Id.is_in(ids))
            .all(&self.conn)
            .await?)
    }

    /// Union of members across `name` and all of its descendants,
    /// deduplicated by path.
    pub async fn get_all_descendant_entries(&self, name: &str) -> CoreResult<Vec<entry::Model>> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;
        let mut set_ids = reachable_ids(&self.conn, set.id, Direction::Forward).await?;
        set_ids.insert(set.id);

        let paths: HashSet<String> = resource_set_membership::Entity::find()
            .filter(resource_set_membership::Column::SetId.is_in(set_ids))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| m.entry_path)
            .collect();
        if paths.is_empty() {
            return Ok(vec![]);
        }
        Ok(entry::Entity::find()
            .filter(entry::Column::Path.is_in(paths))
            .all(&self.conn)
            .await?)
    }

    /// Aggregate `metric` over `name`'s members. When `include_children` is
    /// true, the same entry counted under multiple descendant sets (diamond
    /// pattern) is counted exactly once: the root's members are counted
    /// first, then each descendant set's *not yet counted* members are
    /// folded in, in any order.
    pub async fn resource_sum(&self, name: &str, metric: Metric, include_children: bool) -> CoreResult<ResourceSum> {
        let set = self
            .get_set(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))?;

        let mut visited: HashSet<String> = HashSet::new();
        let root_paths = self.members(name).await?;
        visited.extend(root_paths.iter().cloned());
        let root_value = self.metric_over(&root_paths, metric).await?;

        let mut breakdown = vec![SetContribution {
            set_name: name.to_string(),
            value: root_value,
        }];
        let mut total = root_value;

        if include_children {
            let descendants = resource_set::Entity::find()
                .filter(
                    resource_set::Column::Id
                        .is_in(reachable_ids(&self.conn, set.id, Direction::Forward).await?),
                )
                .all(&self.conn)
                .await?;

            for descendant in descendants {
                let member_paths = resource_set_membership::Entity::find()
                    .filter(resource_set_membership::Column::SetId.eq(descendant.id))
                    .all(&self.conn)
                    .await?;
                let fresh: Vec<String> = member_paths
                    .into_iter()
                    .map(|m| m.entry_path)
                    .filter(|p| !visited.contains(p))
                    .collect();
                if fresh.is_empty() {
                    continue;
                }
                visited.extend(fresh.iter().cloned());
                let contribution = self.metric_over(&fresh, metric).await?;
                total += contribution;
                breakdown.push(SetContribution {
                    set_name: descendant.name,
                    value: contribution,
                });
            }
        }

        Ok(ResourceSum {
            value: total,
            breakdown,
        })
    }

    async fn metric_over(&self, paths: &[String], metric: Metric) -> CoreResult<i64> {
        if paths.is_empty() {
            return Ok(0);
        }
        let entries = entry::Entity::find()
            .filter(entry::Column::Path.is_in(paths.to_vec()))
            .all(&self.conn)
            .await?;
        Ok(match metric {
            Metric::Size => entries.iter().map(|e| e.size).sum(),
            Metric::Count => entries.len() as i64,
            Metric::CountFiles => entries
                .iter()
                .filter(|e| e.entry_kind() == entry::EntryKind::File)
                .count() as i64,
            Metric::CountDirectories => entries
                .iter()
                .filter(|e| e.entry_kind() == entry::EntryKind::Directory)
                .count() as i64,
        })
    }
}

async fn find_set_by_name<C: sea_orm::ConnectionTrait>(
    conn: &C,
    name: &str,
) -> CoreResult<resource_set::Model> {
    resource_set::Entity::find()
        .filter(resource_set::Column::Name.eq(name))
        .one(conn)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("resource set '{name}'")))
}

async fn bump_updated_at<C: sea_orm::ConnectionTrait>(
    conn: &C,
    set: resource_set::Model,
) -> CoreResult<()> {
    let mut active: resource_set::ActiveModel = set.into();
    active.updated_at = ActiveSet(Utc::now());
    active.update(conn).await?;
    Ok(())
}

#[derive(Clone, Copy)]
enum Direction {
    /// Follow `parent_id -> child_id` edges forward (toward descendants).
    Forward,
    /// Follow edges backward (toward ancestors).
    Backward,
}

/// BFS over the edge table from `start`, excluding `start` itself. Visits a
/// finite node set because the graph has finitely many resource sets.
async fn reachable_ids<C: sea_orm::ConnectionTrait>(
    conn: &C,
    start: i32,
    direction: Direction,
) -> CoreResult<HashSet<i32>> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        let next_ids: Vec<i32> = match direction {
            Direction::Forward => resource_set_edge::Entity::find()
                .filter(resource_set_edge::Column::ParentId.eq(current))
                .all(conn)
                .await?
                .into_iter()
                .map(|e| e.child_id)
                .collect(),
            Direction::Backward => resource_set_edge::Entity::find()
                .filter(resource_set_edge::Column::ChildId.eq(current))
                .all(conn)
                .await?
                .into_iter()
                .map(|e| e.parent_id)
                .collect(),
        };
        for id in next_ids {
            if visited.insert(id) {
                queue.push_back(id);
            }
        }
    }
    Ok(visited)
}

/// Would inserting edge `parent -> child` close a cycle? True iff `parent`
/// is already reachable by following existing edges forward from `child`
/// (a path `child -> ... -> parent` already exists, so the new edge would
/// complete `parent -> child -> ... -> parent`).
async fn would_cycle<C: sea_orm::ConnectionTrait>(conn: &C, parent_id: i32, child_id: i32) -> CoreResult<bool> {
    let descendants_of_child = reachable_ids(conn, child_id, Direction::Forward).await?;
    Ok(descendants_of_child.contains(&parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_metric_variants_are_constructible() {
        let metrics = [
            Metric::Size,
            Metric::Count,
            Metric::CountFiles,
            Metric::CountDirectories,
        ];
        assert_eq!(metrics.len(), 4);
    }
}
