//! Database migrations. Applied in order, idempotently, on every open.

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_initial_tables;
mod m20260102_000001_add_entry_blocks_column;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_initial_tables::Migration),
            Box::new(m20260102_000001_add_entry_blocks_column::Migration),
        ]
    }
}
