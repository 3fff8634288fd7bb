//! Declarative file filters, saved queries, and their execution history.
//!
//! [`FileFilter`] is built into a parameterized `sea-orm` condition — never
//! by interpolating user-supplied strings into SQL — and `sort_by` is
//! checked against an allow-list before it reaches a query builder, per
//! `spec.md` §4.7. `pattern` is a regex applied in-process, row-by-row,
//! after the store returns candidate rows, since SQLite has no native
//! regex operator.

use crate::database::entities::{entry, query, query_execution};
use crate::error::{CoreError, CoreResult};
use crate::write_queue::WriteQueue;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set as ActiveSet, ColumnTrait, Condition, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Size,
    Name,
    Mtime,
    Ctime,
    Path,
}

/// The allow-list `spec.md` §4.7 requires: only these fields may drive
/// `ORDER BY`, closing off any path to SQL injection through `sort_by`.
const ALLOWED_SORT_FIELDS: &[&str] = &["size", "name", "mtime", "ctime", "path"];

impl SortBy {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        match raw {
            "size" => Ok(Self::Size),
            "name" => Ok(Self::Name),
            "mtime" => Ok(Self::Mtime),
            "ctime" => Ok(Self::Ctime),
            "path" => Ok(Self::Path),
            other => Err(CoreError::invalid_input(format!(
                "unknown sort field '{other}', expected one of {ALLOWED_SORT_FIELDS:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilter {
    pub path: Option<String>,
    pub extensions: Vec<String>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    /// `YYYY-MM-DD`.
    pub min_date: Option<String>,
    /// `YYYY-MM-DD`.
    pub max_date: Option<String>,
    pub name_contains: Option<String>,
    pub path_contains: Option<String>,
    pub pattern: Option<String>,
    #[serde(default = "default_sort_by")]
    pub sort_by: SortBy,
    #[serde(default)]
    pub descending: bool,
    pub limit: Option<u64>,
}

fn default_sort_by() -> SortBy {
    SortBy::Size
}

fn parse_date(raw: &str) -> CoreResult<i64> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| CoreError::invalid_input(format!("invalid date '{raw}', expected YYYY-MM-DD")))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
        .timestamp())
}

/// Compiled, ready-to-execute form of a [`FileFilter`]: the regex (if any)
/// is compiled once up front rather than per row.
struct CompiledFilter {
    condition: Condition,
    sort_by: SortBy,
    descending: bool,
    limit: Option<u64>,
    pattern: Option<Regex>,
}

fn compile(filter: &FileFilter) -> CoreResult<CompiledFilter> {
    let mut condition = Condition::all();

    if let Some(path) = &filter.path {
        condition = condition.add(
            Condition::any()
                .add(entry::Column::Path.eq(path.clone()))
                .add(entry::Column::Path.starts_with(&format!("{path}/"))),
        );
    }
    if !filter.extensions.is_empty() {
        let mut any = Condition::any();
        for ext in &filter.extensions {
            let ext = ext.trim_start_matches('.');
            any = any.add(entry::Column::Path.like(format!("%.{ext}")));
        }
        condition = condition.add(any);
    }
    if let Some(min_size) = filter.min_size {
        condition = condition.add(entry::Column::Size.gte(min_size));
    }
    if let Some(max_size) = filter.max_size {
        condition = condition.add(entry::Column::Size.lte(max_size));
    }
    if let Some(min_date) = &filter.min_date {
        condition = condition.add(entry::Column::Mtime.gte(parse_date(min_date)?));
    }
    if let Some(max_date) = &filter.max_date {
        condition = condition.add(entry::Column::Mtime.lte(parse_date(max_date)?));
    }
    if let Some(needle) = &filter.name_contains {
        condition = condition.add(entry::Column::Path.like(format!("%{needle}%")));
    }
    if let Some(needle) = &filter.path_contains {
        condition = condition.add(entry::Column::Path.like(format!("%{needle}%")));
    }

    let pattern = filter
        .pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| CoreError::invalid_input(format!("invalid pattern: {e}")))?;

    Ok(CompiledFilter {
        condition,
        sort_by: filter.sort_by,
        descending: filter.descending,
        limit: filter.limit,
        pattern,
    })
}

/// Execute `filter` against the catalog directly (no audit row). Saved
/// queries wrap this with [`QueryEngine::run_saved`], which also records a
/// [`query_execution::Model`].
pub async fn execute_file_filter(conn: &DatabaseConnection, filter: &FileFilter) -> CoreResult<Vec<entry::Model>> {
    let compiled = compile(filter)?;

    let mut select = entry::Entity::find().filter(compiled.condition);
    select = match compiled.sort_by {
        SortBy::Size => order(select, entry::Column::Size, compiled.descending),
        SortBy::Name => order(select, entry::Column::Path, compiled.descending),
        SortBy::Mtime => order(select, entry::Column::Mtime, compiled.descending),
        SortBy::Ctime => order(select, entry::Column::Ctime, compiled.descending),
        SortBy::Path => order(select, entry::Column::Path, compiled.descending),
    };
    // Over-fetch before the in-process regex pass, which can only narrow
    // the result further, so the store-side LIMIT cannot be applied as-is
    // when a pattern is present.
    if compiled.pattern.is_none() {
        if let Some(limit) = compiled.limit {
            select = select.limit(limit);
        }
    }

    let rows = select.all(conn).await?;
    let rows = match &compiled.pattern {
        Some(re) => rows.into_iter().filter(|r| re.is_match(&r.path)).collect(),
        None => rows,
    };
    Ok(match compiled.limit {
        Some(limit) if compiled.pattern.is_some() => {
            rows.into_iter().take(limit as usize).collect()
        }
        _ => rows,
    })
}

fn order<E>(select: sea_orm::Select<E>, col: impl ColumnTrait, descending: bool) -> sea_orm::Select<E>
where
    E: EntityTrait,
{
    if descending {
        select.order_by_desc(col)
    } else {
        select.order_by_asc(col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    FileFilter,
    CustomScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    Replace,
    Append,
    Merge,
}

pub struct QueryEngine {
    conn: DatabaseConnection,
    queue: Arc<WriteQueue>,
}

impl QueryEngine {
    pub fn new(conn: DatabaseConnection, queue: Arc<WriteQueue>) -> Self {
        Self { conn, queue }
    }

    pub async fn save(
        &self,
        name: &str,
        query_type: QueryType,
        filter: &FileFilter,
        target_resource_set: Option<String>,
        update_mode: UpdateMode,
    ) -> CoreResult<query::Model> {
        let name = name.to_string();
        let query_json = serde_json::to_string(filter)
            .map_err(|e| CoreError::invalid_input(format!("failed to serialize filter: {e}")))?;
        let query_type = query_type_str(query_type).to_string();
        let update_mode = update_mode_str(update_mode).to_string();
        self.queue
            .submit_tx_value(None, move |txn| {
                Box::pin(async move {
                    let active = query::ActiveModel {
                        id: Default::default(),
                        name: ActiveSet(name),
                        query_type: ActiveSet(query_type),
                        query_json: ActiveSet(query_json),
                        target_resource_set: ActiveSet(target_resource_set),
                        update_mode: ActiveSet(update_mode),
                        last_executed: ActiveSet(None),
                        execution_count: ActiveSet(0),
                    };
                    Ok(active.insert(txn).await?)
                })
            })
            .await
    }

    pub async fn get(&self, name: &str) -> CoreResult<Option<query::Model>> {
        Ok(query::Entity::find()
            .filter(query::Column::Name.eq(name))
            .one(&self.conn)
            .await?)
    }

    pub async fn list(&self) -> CoreResult<Vec<query::Model>> {
        Ok(query::Entity::find().all(&self.conn).await?)
    }

    /// Run a saved query by name, recording an execution row whether it
    /// succeeds or fails (including failed regex compilation).
    pub async fn run_saved(&self, name: &str) -> CoreResult<Vec<entry::Model>> {
        let saved = self
            .get(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("query '{name}'")))?;

        let start = std::time::Instant::now();
        let parsed: CoreResult<FileFilter> = serde_json::from_str(&saved.query_json)
            .map_err(|e| CoreError::invalid_input(format!("corrupt saved filter: {e}")));

        let result = match parsed {
            Ok(filter) => execute_file_filter(&self.conn, &filter).await,
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as i64;

        let (status, error_message, files_matched) = match &result {
            Ok(rows) => ("success".to_string(), None, Some(rows.len() as i64)),
            Err(e) => ("error".to_string(), Some(e.to_string()), None),
        };

        let query_id = saved.id;
        self.queue
            .submit_tx(
                None,
                Box::new(move |txn| {
                    Box::pin(async move {
                        let execution = query_execution::ActiveModel {
                            id: Default::default(),
                            query_id: ActiveSet(query_id),
                            executed_at: ActiveSet(Utc::now()),
                            duration_ms: ActiveSet(Some(duration_ms)),
                            files_matched: ActiveSet(files_matched),
                            status: ActiveSet(status),
                            error_message: ActiveSet(error_message),
                        };
                        execution.insert(txn).await?;

                        let stored = query::Entity::find_by_id(query_id)
                            .one(txn)
                            .await?
                            .ok_or_else(|| CoreError::not_found(format!("query id {query_id}")))?;
                        let next_count = stored.execution_count + 1;
                        let mut active: query::ActiveModel = stored.into();
                        active.last_executed = ActiveSet(Some(Utc::now()));
                        active.execution_count = ActiveSet(next_count);
                        active.update(txn).await?;
                        Ok(())
                    })
                }),
            )
            .await?;

        result
    }

    pub async fn executions(&self, name: &str) -> CoreResult<Vec<query_execution::Model>> {
        let saved = self
            .get(name)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("query '{name}'")))?;
        Ok(query_execution::Entity::find()
            .filter(query_execution::Column::QueryId.eq(saved.id))
            .order_by_desc(query_execution::Column::ExecutedAt)
            .all(&self.conn)
            .await?)
    }
}

fn query_type_str(t: QueryType) -> &'static str {
    match t {
        QueryType::FileFilter => "file_filter",
        QueryType::CustomScript => "custom_script",
    }
}

fn update_mode_str(m: UpdateMode) -> &'static str {
    match m {
        UpdateMode::Replace => "replace",
        UpdateMode::Append => "append",
        UpdateMode::Merge => "merge",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_by_rejects_unknown_field() {
        assert!(SortBy::parse("size").is_ok());
        assert!(SortBy::parse("'; DROP TABLE entries; --").is_err());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_compile_time() {
        let filter = FileFilter {
            pattern: Some("(unclosed".to_string()),
            ..Default::default()
        };
        assert!(compile(&filter).is_err());
    }
}
