//! `catalog-core`: an embeddable filesystem catalog. Indexes a directory
//! tree into a queryable store, tracks aggregate disk usage, groups
//! entries into an acyclic resource-set DAG, and automates grouping via
//! rules and plans — all mutation serialized through a single write queue.
//!
//! This crate is a library: it has no RPC front-end, scanner, or
//! classifier. Those are external collaborators that plug in through the
//! [`source::EntrySource`] and [`classifier::Classifier`] traits.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod database;
pub mod error;
pub mod indexing_lock;
pub mod jobs;
pub mod metadata;
pub mod plans;
pub mod progress;
pub mod query;
pub mod resource_set;
pub mod rules;
pub mod source;
pub mod tree;
pub mod worker_pool;
pub mod write_queue;

use crate::config::Config;
use crate::database::{Backend, SqliteBackend};
use crate::error::CoreResult;
use std::sync::Arc;

/// Every store and engine wired against one write queue and one database
/// connection, in the dependency order `spec.md` §2 lays out: write queue
/// → catalog store → (tree ∥ resource sets ∥ query engine ∥ job stores) →
/// progress tracking, rules, plans, worker pool.
pub struct Catalog {
    backend: Box<dyn Backend>,
    pub queue: Arc<write_queue::WriteQueue>,
    pub store: catalog::CatalogStore,
    pub resource_sets: resource_set::ResourceSetStore,
    pub queries: query::QueryEngine,
    pub index_jobs: jobs::IndexJobStore,
    pub classifier_jobs: jobs::ClassifierJobStore,
    pub metadata: metadata::MetadataStore,
    pub rules: rules::RuleEngine,
    pub plans: plans::PlanEngine,
}

impl Catalog {
    /// Open the backend (applying migrations), start the write queue, and
    /// construct every dependent store/engine against the shared
    /// connection and queue.
    pub async fn open(config: Config) -> CoreResult<Self> {
        if config.backend == crate::config::BackendKind::Postgresql {
            return Err(database::unimplemented_postgres_backend());
        }

        let mut backend = SqliteBackend::new(config.sqlite.clone());
        backend.open().await?;
        let conn = backend.db()?.clone();

        let queue = Arc::new(write_queue::WriteQueue::new(conn.clone(), config.write_queue.clone()));
        queue.start().await;

        let store = catalog::CatalogStore::new(conn.clone(), queue.clone());
        let resource_sets = resource_set::ResourceSetStore::new(conn.clone(), queue.clone());
        let queries = query::QueryEngine::new(conn.clone(), queue.clone());
        let index_jobs = jobs::IndexJobStore::new(conn.clone(), queue.clone());
        let classifier_jobs = jobs::ClassifierJobStore::new(conn.clone(), queue.clone());
        let metadata = metadata::MetadataStore::new(conn.clone(), queue.clone());
        let rules = rules::RuleEngine::new(conn.clone(), queue.clone());
        let plans = plans::PlanEngine::new(conn, queue.clone());

        Ok(Self {
            backend: Box::new(backend),
            queue,
            store,
            resource_sets,
            queries,
            index_jobs,
            classifier_jobs,
            metadata,
            rules,
            plans,
        })
    }

    pub fn connection_info(&self) -> String {
        self.backend.connection_info()
    }

    /// Drain the write queue, then close the backend connection.
    pub async fn close(&mut self) -> CoreResult<()> {
        self.queue.stop().await;
        self.backend.close();
        Ok(())
    }

    /// Start a new progress tracker bound to an index job this catalog's
    /// write queue will flush through.
    pub fn index_progress(
        &self,
        job_id: impl Into<String>,
        config: config::ProgressTrackerConfig,
    ) -> progress::ProgressTracker {
        progress::ProgressTracker::new(job_id, progress::JobKind::Index, self.queue.clone(), config)
    }

    /// Start a new progress tracker bound to a classifier job.
    pub fn classifier_progress(
        &self,
        job_id: impl Into<String>,
        config: config::ProgressTrackerConfig,
    ) -> progress::ProgressTracker {
        progress::ProgressTracker::new(job_id, progress::JobKind::Classifier, self.queue.clone(), config)
    }
}
