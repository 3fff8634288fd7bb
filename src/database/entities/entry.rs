//! Filesystem entry entity — one row per catalogued path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub path: String,
    /// Path of the containing directory, or `None` for a root. Not a DB-level
    /// foreign key: (I1) is enforced by the catalog store so that a
    /// non-recursive delete can leave children with a dangling `parent`
    /// value for a caller to repair, rather than being silently cascaded.
    pub parent: Option<String>,
    /// Aggregated sum of children for directories, computed by `ComputeAggregates`.
    pub size: i64,
    /// 0 = file, 1 = directory. See [`EntryKind`].
    pub kind: i32,
    pub ctime: i64,
    pub mtime: i64,
    pub last_scanned: i64,
    pub dirty: bool,
    /// Disk-block count, populated opportunistically by the scanner.
    pub blocks: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::metadata::Entity")]
    Metadata,
    #[sea_orm(has_many = "super::resource_set_membership::Entity")]
    ResourceSetMemberships,
}

impl Related<super::metadata::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Metadata.def()
    }
}

impl Related<super::resource_set_membership::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ResourceSetMemberships.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File = 0,
    Directory = 1,
}

impl From<i32> for EntryKind {
    fn from(value: i32) -> Self {
        match value {
            1 => EntryKind::Directory,
            _ => EntryKind::File,
        }
    }
}

impl From<EntryKind> for i32 {
    fn from(kind: EntryKind) -> Self {
        kind as i32
    }
}

impl Model {
    pub fn entry_kind(&self) -> EntryKind {
        EntryKind::from(self.kind)
    }

    pub fn is_directory(&self) -> bool {
        self.entry_kind() == EntryKind::Directory
    }
}
