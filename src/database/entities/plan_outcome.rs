//! One dispatched outcome of a plan execution. Same audit-trail pattern as
//! [`super::rule_outcome`]: `resource_set_id` is required and non-zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plan_outcome_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub plan_execution_id: i32,
    pub resource_set_id: i32,
    pub action: String,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::plan_execution::Entity",
        from = "Column::PlanExecutionId",
        to = "super::plan_execution::Column::Id"
    )]
    PlanExecution,
    #[sea_orm(
        belongs_to = "super::resource_set::Entity",
        from = "Column::ResourceSetId",
        to = "super::resource_set::Column::Id"
    )]
    ResourceSet,
}

impl Related<super::plan_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PlanExecution.def()
    }
}

impl Related<super::resource_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
