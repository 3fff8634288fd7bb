//! Extension point for the scanner collaborator excluded from this crate.
//!
//! The core never drives a filesystem walk itself; it only consumes the
//! entries a scanner hands it via [`CatalogStore::upsert_entry`](crate::catalog::CatalogStore::upsert_entry).
//! `EntrySource` formalizes that boundary so the core can be exercised with
//! a test double instead of a real scanner.

use crate::catalog::UpsertEntry;
use crate::error::CoreResult;
use async_trait::async_trait;

/// One batch of entries discovered under `root` by an external scanner.
#[async_trait]
pub trait EntrySource: Send + Sync {
    async fn scan_root(&self, root: &str) -> CoreResult<Vec<UpsertEntry>>;
}
