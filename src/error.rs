//! Crate-wide error type
//!
//! One variant per error kind in the catalog's failure-semantics table:
//! not found, invalid input, constraint violation, cycle, contention,
//! shutdown, fatal. `not found` is usually surfaced as `Option`/`None`
//! rather than this variant, but callers that must propagate an absence
//! through a `Result`-returning signature use it too.

use std::fmt;
use thiserror::Error;

pub type CoreResult<T = ()> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup by unique key found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Unknown sort field, malformed regex, invalid date, bad metric, etc.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing required foreign key, uniqueness collision, or similar.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Edge insertion would create a cycle in the resource-set DAG.
    #[error("cycle detected: {0}")]
    Cycle(String),

    /// Queue full, pool full, double-begin-transaction, indexing already locked.
    #[error("contention: {0}")]
    Contention(String),

    /// Submission after shutdown; non-recoverable.
    #[error("shutdown: {0}")]
    Shutdown(String),

    /// Store unreachable, schema mismatch, or another unrecoverable condition.
    #[error("fatal: {0}")]
    Fatal(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<String> for CoreError {
    fn from(msg: String) -> Self {
        Self::InvalidInput(msg)
    }
}

impl CoreError {
    pub fn not_found<T: fmt::Display>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn invalid_input<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    pub fn constraint<T: fmt::Display>(msg: T) -> Self {
        Self::Constraint(msg.to_string())
    }

    pub fn cycle<T: fmt::Display>(msg: T) -> Self {
        Self::Cycle(msg.to_string())
    }

    pub fn contention<T: fmt::Display>(msg: T) -> Self {
        Self::Contention(msg.to_string())
    }

    pub fn shutdown<T: fmt::Display>(msg: T) -> Self {
        Self::Shutdown(msg.to_string())
    }

    pub fn fatal<T: fmt::Display>(msg: T) -> Self {
        Self::Fatal(msg.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }

    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}
