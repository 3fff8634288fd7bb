//! A named, user-visible grouping that participates in the resource-set DAG.
//!
//! The source material carries two parallel names for this concept
//! (`selection_set` and `resource_set`); this schema settles on
//! `resource_set` and `ResourceSetEdge`/`ResourceSetMembership` are its
//! only satellite tables. `AddResourceSetChild` from the source material
//! is kept as an alias of `add_edge` on [`crate::resource_set::ResourceSetStore`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "resource_sets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::resource_set_membership::Entity")]
    Memberships,
}

impl Related<super::resource_set_membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
