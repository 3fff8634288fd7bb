//! Additive migration: a nullable `blocks` column on `entries`, applied
//! idempotently on top of the initial schema. Disk-block count for a file,
//! populated opportunistically by the scanner; `None` until then.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Entries::Table)
                    .add_column_if_not_exists(ColumnDef::new(Entries::Blocks).big_integer().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Entries::Table)
                    .drop_column(Entries::Blocks)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Entries {
    Table,
    Blocks,
}
