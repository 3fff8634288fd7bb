//! Initial migration: creates every table named in the catalog schema.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Entries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Entries::Path).text().not_null().unique_key())
                    .col(ColumnDef::new(Entries::Parent).text())
                    .col(ColumnDef::new(Entries::Size).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Entries::Kind).integer().not_null())
                    .col(ColumnDef::new(Entries::Ctime).big_integer().not_null())
                    .col(ColumnDef::new(Entries::Mtime).big_integer().not_null())
                    .col(ColumnDef::new(Entries::LastScanned).big_integer().not_null())
                    .col(
                        ColumnDef::new(Entries::Dirty)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entries_parent")
                    .table(Entries::Table)
                    .col(Entries::Parent)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entries_last_scanned")
                    .table(Entries::Table)
                    .col(Entries::LastScanned)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ResourceSets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ResourceSets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ResourceSets::Name)
                            .text()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(ResourceSets::Description).text())
                    .col(
                        ColumnDef::new(ResourceSets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ResourceSets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ResourceSetEdges::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ResourceSetEdges::ParentId).integer().not_null())
                    .col(ColumnDef::new(ResourceSetEdges::ChildId).integer().not_null())
                    .col(
                        ColumnDef::new(ResourceSetEdges::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ResourceSetEdges::ParentId)
                            .col(ResourceSetEdges::ChildId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edge_parent")
                            .from(ResourceSetEdges::Table, ResourceSetEdges::ParentId)
                            .to(ResourceSets::Table, ResourceSets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edge_child")
                            .from(ResourceSetEdges::Table, ResourceSetEdges::ChildId)
                            .to(ResourceSets::Table, ResourceSets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_edges_child")
                    .table(ResourceSetEdges::Table)
                    .col(ResourceSetEdges::ChildId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ResourceSetMemberships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ResourceSetMemberships::SetId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ResourceSetMemberships::EntryPath)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ResourceSetMemberships::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(ResourceSetMemberships::SetId)
                            .col(ResourceSetMemberships::EntryPath),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_set")
                            .from(ResourceSetMemberships::Table, ResourceSetMemberships::SetId)
                            .to(ResourceSets::Table, ResourceSets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_membership_entry")
                            .from(ResourceSetMemberships::Table, ResourceSetMemberships::EntryPath)
                            .to(Entries::Table, Entries::Path)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_membership_entry")
                    .table(ResourceSetMemberships::Table)
                    .col(ResourceSetMemberships::EntryPath)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Metadata::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Metadata::Hash).text().not_null().primary_key())
                    .col(ColumnDef::new(Metadata::SourcePath).text().not_null())
                    .col(ColumnDef::new(Metadata::MetadataType).text().not_null())
                    .col(ColumnDef::new(Metadata::MimeType).text())
                    .col(ColumnDef::new(Metadata::CachePath).text())
                    .col(ColumnDef::new(Metadata::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(Metadata::MetadataJson).text())
                    .col(
                        ColumnDef::new(Metadata::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_metadata_source")
                            .from(Metadata::Table, Metadata::SourcePath)
                            .to(Entries::Table, Entries::Path)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Queries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Queries::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Queries::Name).text().not_null().unique_key())
                    .col(ColumnDef::new(Queries::QueryType).text().not_null())
                    .col(ColumnDef::new(Queries::QueryJson).text().not_null())
                    .col(ColumnDef::new(Queries::TargetResourceSet).text())
                    .col(ColumnDef::new(Queries::UpdateMode).text().not_null())
                    .col(ColumnDef::new(Queries::LastExecuted).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Queries::ExecutionCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QueryExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueryExecutions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueryExecutions::QueryId).integer().not_null())
                    .col(
                        ColumnDef::new(QueryExecutions::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QueryExecutions::DurationMs).big_integer())
                    .col(ColumnDef::new(QueryExecutions::FilesMatched).big_integer())
                    .col(ColumnDef::new(QueryExecutions::Status).text().not_null())
                    .col(ColumnDef::new(QueryExecutions::ErrorMessage).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_query_execution_query")
                            .from(QueryExecutions::Table, QueryExecutions::QueryId)
                            .to(Queries::Table, Queries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IndexJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(IndexJobs::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(IndexJobs::RootPath).text().not_null())
                    .col(ColumnDef::new(IndexJobs::Status).text().not_null())
                    .col(ColumnDef::new(IndexJobs::Progress).integer().not_null().default(0))
                    .col(ColumnDef::new(IndexJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(IndexJobs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(IndexJobs::Error).text())
                    .col(ColumnDef::new(IndexJobs::Metadata).text())
                    .col(
                        ColumnDef::new(IndexJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(IndexJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ClassifierJobs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ClassifierJobs::Id).text().not_null().primary_key())
                    .col(ColumnDef::new(ClassifierJobs::ResourceUrl).text())
                    .col(ColumnDef::new(ClassifierJobs::LocalPath).text().not_null())
                    .col(ColumnDef::new(ClassifierJobs::ArtifactTypes).text().not_null())
                    .col(ColumnDef::new(ClassifierJobs::Status).text().not_null())
                    .col(
                        ColumnDef::new(ClassifierJobs::Progress)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ClassifierJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ClassifierJobs::CompletedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ClassifierJobs::Error).text())
                    .col(ColumnDef::new(ClassifierJobs::Result).text())
                    .col(
                        ColumnDef::new(ClassifierJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ClassifierJobs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rules::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Rules::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Rules::Name).text().not_null().unique_key())
                    .col(ColumnDef::new(Rules::Enabled).boolean().not_null().default(true))
                    .col(ColumnDef::new(Rules::Priority).integer().not_null().default(0))
                    .col(ColumnDef::new(Rules::ConditionJson).text().not_null())
                    .col(ColumnDef::new(Rules::OutcomeJson).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RuleExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RuleExecutions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RuleExecutions::RuleId).integer().not_null())
                    .col(ColumnDef::new(RuleExecutions::EntryPath).text().not_null())
                    .col(ColumnDef::new(RuleExecutions::Matched).boolean().not_null())
                    .col(
                        ColumnDef::new(RuleExecutions::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RuleExecutions::Status).text().not_null())
                    .col(ColumnDef::new(RuleExecutions::ErrorMessage).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_execution_rule")
                            .from(RuleExecutions::Table, RuleExecutions::RuleId)
                            .to(Rules::Table, Rules::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RuleOutcomes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RuleOutcomes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(RuleOutcomes::RuleExecutionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RuleOutcomes::ResourceSetId)
                            .integer()
                            .not_null()
                            .check(Expr::col(RuleOutcomes::ResourceSetId).ne(0)),
                    )
                    .col(ColumnDef::new(RuleOutcomes::Action).text().not_null())
                    .col(ColumnDef::new(RuleOutcomes::Status).text().not_null())
                    .col(ColumnDef::new(RuleOutcomes::ErrorMessage).text())
                    .col(
                        ColumnDef::new(RuleOutcomes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_outcome_execution")
                            .from(RuleOutcomes::Table, RuleOutcomes::RuleExecutionId)
                            .to(RuleExecutions::Table, RuleExecutions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rule_outcome_set")
                            .from(RuleOutcomes::Table, RuleOutcomes::ResourceSetId)
                            .to(ResourceSets::Table, ResourceSets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Plans::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Plans::Name).text().not_null().unique_key())
                    .col(ColumnDef::new(Plans::Mode).text().not_null())
                    .col(ColumnDef::new(Plans::Status).text().not_null())
                    .col(ColumnDef::new(Plans::SourcesJson).text().not_null())
                    .col(ColumnDef::new(Plans::ConditionsJson).text())
                    .col(ColumnDef::new(Plans::OutcomesJson).text().not_null())
                    .col(ColumnDef::new(Plans::LastRunAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlanExecutions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlanExecutions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PlanExecutions::PlanId).integer().not_null())
                    .col(
                        ColumnDef::new(PlanExecutions::ExecutedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PlanExecutions::Status).text().not_null())
                    .col(ColumnDef::new(PlanExecutions::ErrorMessage).text())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plan_execution_plan")
                            .from(PlanExecutions::Table, PlanExecutions::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlanOutcomeRecords::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PlanOutcomeRecords::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PlanOutcomeRecords::PlanExecutionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PlanOutcomeRecords::ResourceSetId)
                            .integer()
                            .not_null()
                            .check(Expr::col(PlanOutcomeRecords::ResourceSetId).ne(0)),
                    )
                    .col(ColumnDef::new(PlanOutcomeRecords::Action).text().not_null())
                    .col(ColumnDef::new(PlanOutcomeRecords::Status).text().not_null())
                    .col(ColumnDef::new(PlanOutcomeRecords::ErrorMessage).text())
                    .col(
                        ColumnDef::new(PlanOutcomeRecords::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plan_outcome_execution")
                            .from(PlanOutcomeRecords::Table, PlanOutcomeRecords::PlanExecutionId)
                            .to(PlanExecutions::Table, PlanExecutions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plan_outcome_set")
                            .from(PlanOutcomeRecords::Table, PlanOutcomeRecords::ResourceSetId)
                            .to(ResourceSets::Table, ResourceSets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        macro_rules! drop_table {
            ($table:expr) => {
                manager
                    .drop_table(Table::drop().table($table).if_exists().to_owned())
                    .await?;
            };
        }
        drop_table!(PlanOutcomeRecords::Table);
        drop_table!(PlanExecutions::Table);
        drop_table!(Plans::Table);
        drop_table!(RuleOutcomes::Table);
        drop_table!(RuleExecutions::Table);
        drop_table!(Rules::Table);
        drop_table!(ClassifierJobs::Table);
        drop_table!(IndexJobs::Table);
        drop_table!(QueryExecutions::Table);
        drop_table!(Queries::Table);
        drop_table!(Metadata::Table);
        drop_table!(ResourceSetMemberships::Table);
        drop_table!(ResourceSetEdges::Table);
        drop_table!(ResourceSets::Table);
        drop_table!(Entries::Table);
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Entries {
    Table,
    Id,
    Path,
    Parent,
    Size,
    Kind,
    Ctime,
    Mtime,
    LastScanned,
    Dirty,
}

#[derive(DeriveIden)]
enum ResourceSets {
    Table,
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ResourceSetEdges {
    Table,
    ParentId,
    ChildId,
    AddedAt,
}

#[derive(DeriveIden)]
enum ResourceSetMemberships {
    Table,
    SetId,
    EntryPath,
    AddedAt,
}

#[derive(DeriveIden)]
enum Metadata {
    Table,
    Hash,
    SourcePath,
    MetadataType,
    MimeType,
    CachePath,
    FileSize,
    MetadataJson,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Queries {
    Table,
    Id,
    Name,
    QueryType,
    QueryJson,
    TargetResourceSet,
    UpdateMode,
    LastExecuted,
    ExecutionCount,
}

#[derive(DeriveIden)]
enum QueryExecutions {
    Table,
    Id,
    QueryId,
    ExecutedAt,
    DurationMs,
    FilesMatched,
    Status,
    ErrorMessage,
}

#[derive(DeriveIden)]
enum IndexJobs {
    Table,
    Id,
    RootPath,
    Status,
    Progress,
    StartedAt,
    CompletedAt,
    Error,
    Metadata,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ClassifierJobs {
    Table,
    Id,
    ResourceUrl,
    LocalPath,
    ArtifactTypes,
    Status,
    Progress,
    StartedAt,
    CompletedAt,
    Error,
    Result,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Rules {
    Table,
    Id,
    Name,
    Enabled,
    Priority,
    ConditionJson,
    OutcomeJson,
}

#[derive(DeriveIden)]
enum RuleExecutions {
    Table,
    Id,
    RuleId,
    EntryPath,
    Matched,
    ExecutedAt,
    Status,
    ErrorMessage,
}

#[derive(DeriveIden)]
enum RuleOutcomes {
    Table,
    Id,
    RuleExecutionId,
    ResourceSetId,
    Action,
    Status,
    ErrorMessage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Plans {
    Table,
    Id,
    Name,
    Mode,
    Status,
    SourcesJson,
    ConditionsJson,
    OutcomesJson,
    LastRunAt,
}

#[derive(DeriveIden)]
enum PlanExecutions {
    Table,
    Id,
    PlanId,
    ExecutedAt,
    Status,
    ErrorMessage,
}

#[derive(DeriveIden)]
enum PlanOutcomeRecords {
    Table,
    Id,
    PlanExecutionId,
    ResourceSetId,
    Action,
    Status,
    ErrorMessage,
    CreatedAt,
}
