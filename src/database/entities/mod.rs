//! SeaORM entity definitions for the catalog schema.

pub mod classifier_job;
pub mod entry;
pub mod index_job;
pub mod metadata;
pub mod plan;
pub mod plan_execution;
pub mod plan_outcome;
pub mod query;
pub mod query_execution;
pub mod resource_set;
pub mod resource_set_edge;
pub mod resource_set_membership;
pub mod rule;
pub mod rule_execution;
pub mod rule_outcome;
