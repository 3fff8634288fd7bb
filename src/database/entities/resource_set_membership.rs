//! Membership of an entry (by path) in a resource set. Primary key `(set_id, entry_path)`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "resource_set_memberships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub set_id: i32,
    #[sea_orm(primary_key, auto_increment = false)]
    pub entry_path: String,
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::resource_set::Entity",
        from = "Column::SetId",
        to = "super::resource_set::Column::Id"
    )]
    ResourceSet,
}

impl Related<super::resource_set::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceSet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
