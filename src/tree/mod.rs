//! Bounded tree view of the catalog, with summary nodes in place of
//! children once a directory gets too wide or the view gets too deep.
//! A single directory may hold millions of entries; unconditional
//! recursion would emit unbounded output, so summary nodes preserve
//! aggregate information without the payload.

use crate::catalog::CatalogStore;
use crate::database::entities::entry::{self, EntryKind};
use crate::error::CoreResult;
use crate::write_queue::Cancel;
use std::future::Future;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Size,
    Name,
    Mtime,
}

#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// 0 = unlimited.
    pub max_depth: usize,
    /// Total node budget across the whole tree. `None` = unlimited.
    pub limit: Option<usize>,
    pub min_size: i64,
    pub sort_by: SortBy,
    pub descending: bool,
    pub min_date: Option<i64>,
    pub max_date: Option<i64>,
    /// Summarize a directory once its filtered child count exceeds this.
    pub child_threshold: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            limit: None,
            min_size: 0,
            sort_by: SortBy::Size,
            descending: true,
            min_date: None,
            max_date: None,
            child_threshold: 200,
        }
    }
}

/// How many of a summarized directory's largest children are listed in its
/// `DirectorySummary`.
const SUMMARY_TOP_N: usize = 10;
/// How many of a summarized directory's children are still recursed into
/// in detail, by size.
const DETAIL_KEEP_N: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct DirectorySummary {
    pub total_children: usize,
    pub file_count: usize,
    pub directory_count: usize,
    pub total_size: i64,
    pub largest_children: Vec<entry::Model>,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub size: i64,
    pub kind: EntryKind,
    pub mtime: i64,
    pub truncated: bool,
    pub summary: Option<DirectorySummary>,
    pub children: Vec<TreeNode>,
}

struct Budget {
    remaining: Option<usize>,
}

impl Budget {
    fn exhausted(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    fn consume_one(&mut self) {
        if let Some(r) = self.remaining.as_mut() {
            *r = r.saturating_sub(1);
        }
    }
}

pub async fn get_tree(
    store: &CatalogStore,
    root: &str,
    opts: &TreeOptions,
    ctx: Cancel,
) -> CoreResult<TreeNode> {
    let root_entry = store
        .get_by_path(root)
        .await?
        .ok_or_else(|| crate::error::CoreError::not_found(format!("entry '{root}' not found")))?;

    let mut budget = Budget {
        remaining: opts.limit,
    };
    budget.consume_one();
    build_node(store, root_entry, opts, &mut budget, 0, &ctx).await
}

fn build_node<'a>(
    store: &'a CatalogStore,
    entry: entry::Model,
    opts: &'a TreeOptions,
    budget: &'a mut Budget,
    depth: usize,
    ctx: &'a Cancel,
) -> Pin<Box<dyn Future<Output = CoreResult<TreeNode>> + Send + 'a>> {
    Box::pin(async move {
        let name = leaf_name(&entry.path);

        if entry.entry_kind() != EntryKind::Directory {
            return Ok(TreeNode {
                name,
                path: entry.path,
                size: entry.size,
                kind: entry.entry_kind(),
                mtime: entry.mtime,
                truncated: false,
                summary: None,
                children: vec![],
            });
        }

        let depth_exhausted = opts.max_depth != 0 && depth >= opts.max_depth;
        if depth_exhausted || budget.exhausted() {
            let summary = Some(directory_summary(store, &entry.path).await?);
            return Ok(TreeNode {
                name,
                path: entry.path,
                size: entry.size,
                kind: entry.entry_kind(),
                mtime: entry.mtime,
                truncated: true,
                summary,
                children: vec![],
            });
        }

        if is_cancelled(ctx) {
            return Ok(TreeNode {
                name,
                path: entry.path,
                size: entry.size,
                kind: entry.entry_kind(),
                mtime: entry.mtime,
                truncated: true,
                summary: None,
                children: vec![],
            });
        }

        let mut filtered: Vec<entry::Model> = store
            .children(&entry.path)
            .await?
            .into_iter()
            .filter(|c| c.size >= opts.min_size)
            .filter(|c| opts.min_date.map_or(true, |min| c.mtime >= min))
            .filter(|c| opts.max_date.map_or(true, |max| c.mtime <= max))
            .collect();

        sort_entries(&mut filtered, opts);

        let (truncated, summary, to_recurse) = if filtered.len() > opts.child_threshold {
            let file_count = filtered.iter().filter(|c| c.entry_kind() == EntryKind::File).count();
            let directory_count = filtered.len() - file_count;
            let total_size: i64 = filtered.iter().map(|c| c.size).sum();
            let mut by_size = filtered.clone();
            by_size.sort_by(|a, b| b.size.cmp(&a.size));
            let largest_children = by_size.iter().take(SUMMARY_TOP_N).cloned().collect();
            let keep: Vec<entry::Model> = by_size.into_iter().take(DETAIL_KEEP_N).collect();
            (
                true,
                Some(DirectorySummary {
                    total_children: filtered.len(),
                    file_count,
                    directory_count,
                    total_size,
                    largest_children,
                }),
                keep,
            )
        } else {
            (false, None, filtered)
        };

        let mut children = Vec::with_capacity(to_recurse.len());
        for child in to_recurse {
            if budget.exhausted() || is_cancelled(ctx) {
                break;
            }
            budget.consume_one();
            match build_node(store, child, opts, budget, depth + 1, ctx).await {
                Ok(node) => children.push(node),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping child that failed to build");
                }
            }
        }

        Ok(TreeNode {
            name,
            path: entry.path,
            size: entry.size,
            kind: entry.entry_kind(),
            mtime: entry.mtime,
            truncated,
            summary,
            children,
        })
    })
}

async fn directory_summary(store: &CatalogStore, path: &str) -> CoreResult<DirectorySummary> {
    let children = store.children(path).await?;
    let file_count = children.iter().filter(|c| c.entry_kind() == EntryKind::File).count();
    let directory_count = children.len() - file_count;
    let total_size: i64 = children.iter().map(|c| c.size).sum();
    let mut by_size = children;
    by_size.sort_by(|a, b| b.size.cmp(&a.size));
    let largest_children = by_size.into_iter().take(SUMMARY_TOP_N).collect();
    Ok(DirectorySummary {
        total_children: file_count + directory_count,
        file_count,
        directory_count,
        total_size,
        largest_children,
    })
}

fn sort_entries(entries: &mut [entry::Model], opts: &TreeOptions) {
    entries.sort_by(|a, b| {
        let ord = match opts.sort_by {
            SortBy::Size => a.size.cmp(&b.size),
            SortBy::Name => a.path.cmp(&b.path),
            SortBy::Mtime => a.mtime.cmp(&b.mtime),
        };
        if opts.descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn leaf_name(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    path.rsplit('/').next().unwrap_or(path).to_string()
}

fn is_cancelled(ctx: &Cancel) -> bool {
    match ctx {
        Some(rx) => *rx.borrow(),
        None => false,
    }
}
