//! Catalog store: typed, path-keyed CRUD over filesystem entries, plus the
//! bottom-up aggregate roll-up and disk-usage summary queries.

use crate::database::entities::entry::{self, EntryKind};
use crate::error::{CoreError, CoreResult};
use crate::indexing_lock::{IndexingGuard, IndexingLock};
use crate::write_queue::WriteQueue;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait,
};
use std::sync::Arc;

/// Input to an upsert-by-path call.
#[derive(Debug, Clone)]
pub struct UpsertEntry {
    pub path: String,
    pub parent: Option<String>,
    pub size: i64,
    pub kind: EntryKind,
    pub ctime: i64,
    pub mtime: i64,
    pub last_scanned: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanInfo {
    pub last_scanned: i64,
    pub dirty: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DiskUsageSummary {
    pub total_size: i64,
    pub total_files: u64,
    pub largest: Option<entry::Model>,
    pub oldest: Option<entry::Model>,
    pub newest: Option<entry::Model>,
}

pub struct CatalogStore {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
    indexing_lock: IndexingLock,
}

impl CatalogStore {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self {
            conn,
            queue,
            indexing_lock: IndexingLock::new(),
        }
    }

    pub fn try_lock_indexing(&self) -> CoreResult<IndexingGuard<'_>> {
        self.indexing_lock.try_lock()
    }

    // ---- writes, routed through the write queue ----------------------

    /// Idempotent upsert by path: overwrites `(parent, size, kind, ctime,
    /// mtime, last_scanned)` and clears `dirty` if the path already exists,
    /// else inserts a fresh row. (I3): `kind` is immutable once set — an
    /// upsert that tries to change an existing row's kind is rejected.
    pub async fn upsert_entry(&self, input: UpsertEntry) -> CoreResult<()> {
        if let Some(parent) = &input.parent {
            self.require_parent_is_directory(parent).await?;
        }
        self.queue
            .submit(
                None,
                Box::new(move |conn| Box::pin(async move { upsert_entry_with(conn, input).await })),
            )
            .await
    }

    async fn require_parent_is_directory(&self, parent: &str) -> CoreResult<()> {
        match self.get_by_path(parent).await? {
            Some(p) if p.is_directory() => Ok(()),
            Some(_) => Err(CoreError::constraint(format!(
                "parent '{parent}' exists but is not a directory"
            ))),
            None => Err(CoreError::constraint(format!(
                "parent '{parent}' does not exist"
            ))),
        }
    }

    /// Remove every entry at or under `root` whose `last_scanned < run_id`.
    /// Returns the number of rows deleted. A nonexistent root deletes
    /// nothing and is not an error.
    pub async fn delete_stale(&self, root: &str, run_id: i64) -> CoreResult<u64> {
        let root = root.to_string();
        self.queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    let result = entry::Entity::delete_many()
                        .filter(path_at_or_under(&root))
                        .filter(entry::Column::LastScanned.lt(run_id))
                        .exec(conn)
                        .await?;
                    Ok(result.rows_affected)
                })
            })
            .await
    }

    /// Delete exactly one entry. Direct children are re-parented to
    /// `None` (made roots) rather than cascaded, satisfying (I1) without
    /// silently deleting a subtree the caller didn't ask to delete — use
    /// [`Self::delete_entry_recursive`] for that.
    pub async fn delete_entry(&self, path: &str) -> CoreResult<bool> {
        let path = path.to_string();
        self.queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    entry::Entity::update_many()
                        .col_expr(
                            entry::Column::Parent,
                            sea_orm::sea_query::Expr::value(Option::<String>::None),
                        )
                        .filter(entry::Column::Parent.eq(path.clone()))
                        .exec(conn)
                        .await?;
                    let result = entry::Entity::delete_many()
                        .filter(entry::Column::Path.eq(path.clone()))
                        .exec(conn)
                        .await?;
                    Ok(result.rows_affected > 0)
                })
            })
            .await
    }

    /// Delete `path` and every descendant beneath it.
    pub async fn delete_entry_recursive(&self, path: &str) -> CoreResult<u64> {
        let path = path.to_string();
        self.queue
            .submit_value(None, move |conn| {
                Box::pin(async move {
                    let result = entry::Entity::delete_many()
                        .filter(path_at_or_under(&path))
                        .exec(conn)
                        .await?;
                    Ok(result.rows_affected)
                })
            })
            .await
    }

    /// Rename a single entry in place. If it has direct children, their
    /// `parent` pointer is updated to the new path too; deeper descendants'
    /// `path`/`parent` columns are untouched — use
    /// [`Self::update_paths_recursive`] to rewrite a whole subtree.
    pub async fn update_entry_path(&self, old_path: &str, new_path: &str) -> CoreResult<()> {
        let (old_path, new_path) = (old_path.to_string(), new_path.to_string());
        self.queue
            .submit(None, Box::new(move |conn| {
                Box::pin(async move {
                    let entry = entry::Entity::find()
                        .filter(entry::Column::Path.eq(old_path.clone()))
                        .one(conn)
                        .await?
                        .ok_or_else(|| CoreError::not_found(format!("entry '{old_path}' not found")))?;
                    let mut active: entry::ActiveModel = entry.into();
                    active.path = Set(new_path.clone());
                    active.update(conn).await?;

                    entry::Entity::update_many()
                        .col_expr(
                            entry::Column::Parent,
                            sea_orm::sea_query::Expr::value(new_path.clone()),
                        )
                        .filter(entry::Column::Parent.eq(old_path))
                        .exec(conn)
                        .await?;
                    Ok(())
                })
            }))
            .await
    }

    /// Rewrite `path` and `parent` for every entry at or under `old_root`,
    /// replacing the `old_root` prefix with `new_root`. Runs under a single
    /// transaction; linear in the number of affected rows.
    pub async fn update_paths_recursive(&self, old_root: &str, new_root: &str) -> CoreResult<u64> {
        let (old_root, new_root) = (old_root.to_string(), new_root.to_string());
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let rows = entry::Entity::find()
                        .filter(path_at_or_under(&old_root))
                        .all(txn)
                        .await?;
                    let mut updated = 0u64;
                    for row in rows {
                        let new_path = replace_prefix(&row.path, &old_root, &new_root);
                        let new_parent = row
                            .parent
                            .as_deref()
                            .map(|p| replace_prefix(p, &old_root, &new_root));
                        if new_path == row.path && new_parent == row.parent {
                            continue;
                        }
                        let mut active: entry::ActiveModel = row.into();
                        active.path = Set(new_path);
                        active.parent = Set(new_parent);
                        active.update(txn).await?;
                        updated += 1;
                    }
                    Ok(updated)
                })
            })
            .await
    }

    /// Enumerate every directory at or under `root` in descending path-length
    /// order (deepest first) and set each one's `size` to the sum of its
    /// direct children's sizes. Children are processed before parents, so a
    /// single bottom-up pass suffices. A nonexistent root is a no-op.
    pub async fn compute_aggregates(&self, root: &str) -> CoreResult<()> {
        let root = root.to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move { compute_aggregates_with(txn, &root).await })
            })
            .await
    }

    // ---- reads, issued directly against the store ---------------------

    pub async fn get_by_path(&self, path: &str) -> CoreResult<Option<entry::Model>> {
        Ok(entry::Entity::find()
            .filter(entry::Column::Path.eq(path))
            .one(&self.conn)
            .await?)
    }

    pub async fn children(&self, parent: &str) -> CoreResult<Vec<entry::Model>> {
        Ok(entry::Entity::find()
            .filter(entry::Column::Parent.eq(parent))
            .all(&self.conn)
            .await?)
    }

    /// Full enumeration. Intended for small catalogs and tests only.
    pub async fn all(&self) -> CoreResult<Vec<entry::Model>> {
        Ok(entry::Entity::find().all(&self.conn).await?)
    }

    pub async fn get_path_last_scanned(&self, path: &str) -> CoreResult<Option<i64>> {
        Ok(self.get_by_path(path).await?.map(|e| e.last_scanned))
    }

    pub async fn get_path_scan_info(&self, path: &str) -> CoreResult<Option<ScanInfo>> {
        Ok(self.get_by_path(path).await?.map(|e| ScanInfo {
            last_scanned: e.last_scanned,
            dirty: e.dirty,
        }))
    }

    /// Totals plus the largest/oldest/newest file at or under `root`, each
    /// from a single indexed query.
    pub async fn get_disk_usage_summary(&self, root: &str) -> CoreResult<DiskUsageSummary> {
        let base = entry::Entity::find()
            .filter(path_at_or_under(root))
            .filter(entry::Column::Kind.eq(i32::from(EntryKind::File)));

        let total_size: Option<i64> = base
            .clone()
            .select_only()
            .column_as(sea_orm::sea_query::Expr::col(entry::Column::Size).sum(), "total")
            .into_model::<SumRow>()
            .one(&self.conn)
            .await?
            .and_then(|r| r.total);

        let total_files = base.clone().count(&self.conn).await?;

        let largest = base
            .clone()
            .order_by_desc(entry::Column::Size)
            .one(&self.conn)
            .await?;
        let oldest = base
            .clone()
            .order_by_asc(entry::Column::Mtime)
            .one(&self.conn)
            .await?;
        let newest = base.order_by_desc(entry::Column::Mtime).one(&self.conn).await?;

        Ok(DiskUsageSummary {
            total_size: total_size.unwrap_or(0),
            total_files,
            largest,
            oldest,
            newest,
        })
    }
}

#[derive(Debug, FromQueryResult)]
struct SumRow {
    total: Option<i64>,
}

fn path_at_or_under(root: &str) -> sea_orm::Condition {
    sea_orm::Condition::any()
        .add(entry::Column::Path.eq(root))
        .add(entry::Column::Path.starts_with(&format!("{root}/")))
}

fn replace_prefix(path: &str, old_root: &str, new_root: &str) -> String {
    if path == old_root {
        new_root.to_string()
    } else if let Some(rest) = path.strip_prefix(&format!("{old_root}/")) {
        format!("{new_root}/{rest}")
    } else {
        path.to_string()
    }
}

/// Shared by the plain write-queue path and the one-off migration helper
/// used outside the queue (e.g. backfills); callers inside the queue use
/// a `&DatabaseConnection`, callers inside `compute_aggregates` use a
/// `&DatabaseTransaction` — both implement `ConnectionTrait`.
async fn upsert_entry_with<C: ConnectionTrait>(conn: &C, input: UpsertEntry) -> CoreResult<()> {
    let existing = entry::Entity::find()
        .filter(entry::Column::Path.eq(input.path.clone()))
        .one(conn)
        .await?;

    match existing {
        Some(row) => {
            if row.entry_kind() != input.kind {
                return Err(CoreError::constraint(format!(
                    "entry '{}' changed kind; delete and re-insert instead",
                    input.path
                )));
            }
            let mut active: entry::ActiveModel = row.into();
            active.parent = Set(input.parent);
            active.size = Set(input.size);
            active.ctime = Set(input.ctime);
            active.mtime = Set(input.mtime);
            active.last_scanned = Set(input.last_scanned);
            active.dirty = Set(false);
            active.update(conn).await?;
        }
        None => {
            let active = entry::ActiveModel {
                id: Default::default(),
                path: Set(input.path),
                parent: Set(input.parent),
                size: Set(input.size),
                kind: Set(input.kind.into()),
                ctime: Set(input.ctime),
                mtime: Set(input.mtime),
                last_scanned: Set(input.last_scanned),
                dirty: Set(false),
                blocks: Set(None),
            };
            active.insert(conn).await?;
        }
    }
    Ok(())
}

async fn compute_aggregates_with<C: ConnectionTrait>(txn: &C, root: &str) -> CoreResult<()> {
    let mut directories = entry::Entity::find()
        .filter(path_at_or_under(root))
        .filter(entry::Column::Kind.eq(i32::from(EntryKind::Directory)))
        .all(txn)
        .await?;

    // Deepest first: children of a directory always have a strictly longer
    // path, so sorting by descending path length processes leaves before
    // their ancestors in one pass.
    directories.sort_by_key(|d| std::cmp::Reverse(d.path.len()));

    for directory in directories {
        let children = entry::Entity::find()
            .filter(entry::Column::Parent.eq(directory.path.clone()))
            .all(txn)
            .await?;
        let size: i64 = children.iter().map(|c| c.size).sum();
        let mut active: entry::ActiveModel = directory.into();
        active.size = Set(size);
        active.update(txn).await?;
    }
    Ok(())
}
