//! In-memory progress tracker that absorbs high-frequency job updates and
//! batches them through the write queue.
//!
//! The scanner can call [`ProgressTracker::update`] thousands of times a
//! second; writing every call straight to the store would create exactly
//! the write pressure the write queue exists to smooth out. Instead the
//! tracker keeps the *latest* progress/metadata in memory and only submits
//! a write when the configured flush interval has elapsed, or when the
//! caller explicitly asks via [`ProgressTracker::flush`] /
//! [`ProgressTracker::flush_sync`].

use crate::config::ProgressTrackerConfig;
use crate::database::entities::{classifier_job, index_job};
use crate::error::{CoreError, CoreResult};
use crate::write_queue::WriteQueue;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set as ActiveSet, EntityTrait};
use serde_json::Value as Json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Which job table a tracker flushes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Index,
    Classifier,
}

struct Inner {
    progress: i32,
    metadata: Option<Json>,
    dirty: bool,
    last_flush: Instant,
}

/// Shared state a background flush task can hold independently of the
/// handle the caller keeps, so `update` never needs `Arc<Self>`.
struct Shared {
    job_id: String,
    kind: JobKind,
    queue: Arc<WriteQueue>,
    state: Mutex<Inner>,
    flushing: AtomicBool,
}

pub struct ProgressTracker {
    shared: Arc<Shared>,
    flush_interval: Mutex<Duration>,
}

impl ProgressTracker {
    pub fn new(job_id: impl Into<String>, kind: JobKind, queue: Arc<WriteQueue>, config: ProgressTrackerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                job_id: job_id.into(),
                kind,
                queue,
                state: Mutex::new(Inner {
                    progress: 0,
                    metadata: None,
                    dirty: false,
                    last_flush: Instant::now(),
                }),
                flushing: AtomicBool::new(false),
            }),
            flush_interval: Mutex::new(config.flush_interval),
        }
    }

    /// Record the latest progress/metadata in memory. Intermediate values
    /// between flushes are intentionally dropped — only the latest survives.
    /// Triggers an asynchronous, non-blocking flush if the flush interval
    /// has elapsed since the last one.
    pub async fn update(&self, progress: i32, metadata: Option<Json>) {
        let should_flush = {
            let mut inner = self.shared.state.lock().await;
            inner.progress = progress;
            if metadata.is_some() {
                inner.metadata = metadata;
            }
            inner.dirty = true;
            inner.last_flush.elapsed() >= *self.flush_interval.lock().await
        };
        if should_flush {
            self.flush();
        }
    }

    /// Non-blocking from the caller's perspective: if dirty, spawns a
    /// background flush through the write queue. If a flush is already in
    /// flight, this call is coalesced into it rather than queuing a second
    /// one — the in-flight flush will pick up whatever `update` wrote most
    /// recently once it runs.
    pub fn flush(&self) {
        if self.shared.flushing.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = self.shared.clone();
        tokio::spawn(async move {
            if let Err(e) = flush_once(&shared).await {
                warn!(error = %e, job_id = %shared.job_id, "progress flush failed");
            }
            shared.flushing.store(false, Ordering::Release);
        });
    }

    /// Same as [`Self::flush`], but waits up to `timeout` for the write to
    /// land before returning.
    pub async fn flush_sync(&self, timeout: Duration) -> CoreResult<()> {
        match tokio::time::timeout(timeout, flush_once(&self.shared)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::contention("progress flush timed out")),
        }
    }

    pub async fn get_progress(&self) -> i32 {
        self.shared.state.lock().await.progress
    }

    /// Returns a copy, never the stored value, so a caller cannot mutate
    /// tracker-internal state through the returned handle.
    pub async fn get_metadata(&self) -> Option<Json> {
        self.shared.state.lock().await.metadata.clone()
    }

    pub async fn is_dirty(&self) -> bool {
        self.shared.state.lock().await.dirty
    }

    pub async fn set_flush_interval(&self, interval: Duration) {
        *self.flush_interval.lock().await = interval;
    }
}

async fn flush_once(shared: &Shared) -> CoreResult<()> {
    let (progress, metadata, was_dirty) = {
        let mut inner = shared.state.lock().await;
        if !inner.dirty {
            return Ok(());
        }
        let snapshot = (inner.progress, inner.metadata.clone(), true);
        inner.dirty = false;
        inner.last_flush = Instant::now();
        snapshot
    };
    if !was_dirty {
        return Ok(());
    }

    let job_id = shared.job_id.clone();
    let kind = shared.kind;
    shared
        .queue
        .submit(
            None,
            Box::new(move |conn| {
                Box::pin(async move { write_progress(conn, kind, &job_id, progress, metadata).await })
            }),
        )
        .await?;
    debug!(job_id = %shared.job_id, progress, "flushed job progress");
    Ok(())
}

async fn write_progress(
    conn: &sea_orm::DatabaseConnection,
    kind: JobKind,
    job_id: &str,
    progress: i32,
    metadata: Option<Json>,
) -> CoreResult<()> {
    let metadata_json = metadata.map(|m| m.to_string());
    match kind {
        JobKind::Index => {
            let job = index_job::Entity::find_by_id(job_id.to_string())
                .one(conn)
                .await?
                .ok_or_else(|| CoreError::not_found(format!("index job '{job_id}'")))?;
            let mut active: index_job::ActiveModel = job.into();
            active.progress = ActiveSet(progress);
            if metadata_json.is_some() {
                active.metadata = ActiveSet(metadata_json);
            }
            active.updated_at = ActiveSet(Utc::now());
            active.update(conn).await?;
        }
        JobKind::Classifier => {
            let job = classifier_job::Entity::find_by_id(job_id.to_string())
                .one(conn)
                .await?
                .ok_or_else(|| CoreError::not_found(format!("classifier job '{job_id}'")))?;
            let mut active: classifier_job::ActiveModel = job.into();
            active.progress = ActiveSet(progress);
            if metadata_json.is_some() {
                active.result = ActiveSet(metadata_json);
            }
            active.updated_at = ActiveSet(Utc::now());
            active.update(conn).await?;
        }
    }
    Ok(())
}
