//! One dispatched outcome of a rule execution. `resource_set_id` is required
//! and non-zero: every outcome is auto-bound to a resource set (see
//! `EnsureResourceSetForOutcome` in `rules::RuleEngine`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rule_outcomes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub rule_execution_id: i32,
    pub resource_set_id: i32,
    pub action: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rule_execution::Entity",
        from = "Column::RuleExecutionId",
        to = "super::rule_execution::Column::Id"
    )]
    RuleExecution,
    #[sea_orm(
        belongs_to = "super::resource_set::Entity",
        from = "Column::ResourceSetId",
        to = "super::resource_set::Column::Id"
    )]
    ResourceSet,
}

impl Related<super::rule_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RuleExecution.def()
    }
}

impl Related<super::resource_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
