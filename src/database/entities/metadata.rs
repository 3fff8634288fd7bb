//! Generated artifact attached to an entry (thumbnail, extracted text, ...).
//! Identity is the content hash; the classifier that produces these rows
//! is an external collaborator, not part of the core.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "metadata")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash: String,
    pub source_path: String,
    pub metadata_type: String,
    pub mime_type: Option<String>,
    pub cache_path: Option<String>,
    pub file_size: i64,
    pub metadata_json: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::entry::Entity",
        from = "Column::SourcePath",
        to = "super::entry::Column::Path"
    )]
    Entry,
}

impl Related<super::entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
