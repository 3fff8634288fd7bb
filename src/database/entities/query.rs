//! A saved declarative filter.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "queries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    /// "file_filter" or "custom_script"
    pub query_type: String,
    /// Serialized `FileFilter` JSON.
    pub query_json: String,
    pub target_resource_set: Option<String>,
    /// "replace", "append", or "merge"
    pub update_mode: String,
    pub last_executed: Option<DateTimeUtc>,
    pub execution_count: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::query_execution::Entity")]
    Executions,
}

impl Related<super::query_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Executions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
