//! Bounded worker pool used to parallelize scan/classify work against the
//! write queue. Structurally this mirrors `write_queue::WriteQueue`'s
//! bounded-channel-plus-workers shape, generalized from one worker to `N`
//! and with pause/resume/cancel added on top.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// A unit of work submitted to the pool.
#[async_trait]
pub trait Job: Send + Sync {
    fn id(&self) -> String;
    async fn execute(&self, cancel: CancellationToken) -> CoreResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub worker_count: usize,
    pub jobs_queued: usize,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
    pub is_paused: bool,
}

struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
}

pub struct WorkerPool {
    worker_count: usize,
    queue_size: usize,
    sender: Mutex<Option<mpsc::Sender<Box<dyn Job>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    queue_len: Arc<AtomicU64>,
    counters: Arc<Counters>,
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
    cancel_token: CancellationToken,
    all_done: Arc<Notify>,
    inflight: Arc<AtomicU64>,
}

impl WorkerPool {
    pub fn new(worker_count: usize, queue_size: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
            queue_size,
            sender: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            queue_len: Arc::new(AtomicU64::new(0)),
            counters: Arc::new(Counters {
                processed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            paused: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
            cancel_token: CancellationToken::new(),
            all_done: Arc::new(Notify::new()),
            inflight: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn start(&self) {
        let mut sender_guard = self.sender.lock().await;
        if sender_guard.is_some() {
            return;
        }
        let (tx, rx) = mpsc::channel::<Box<dyn Job>>(self.queue_size);
        *sender_guard = Some(tx);
        drop(sender_guard);

        let rx = Arc::new(Mutex::new(rx));
        let mut workers = self.workers.lock().await;
        for worker_id in 0..self.worker_count {
            let rx = rx.clone();
            let queue_len = self.queue_len.clone();
            let counters = self.counters.clone();
            let paused = self.paused.clone();
            let resume_notify = self.resume_notify.clone();
            let cancel_token = self.cancel_token.clone();
            let all_done = self.all_done.clone();
            let inflight = self.inflight.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    while paused.load(Ordering::Acquire) {
                        tokio::select! {
                            _ = resume_notify.notified() => {}
                            _ = cancel_token.cancelled() => return,
                        }
                    }

                    let job = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else {
                        debug!(worker_id, "worker pool intake closed, worker exiting");
                        return;
                    };
                    queue_len.fetch_sub(1, Ordering::SeqCst);
                    inflight.fetch_add(1, Ordering::SeqCst);

                    match job.execute(cancel_token.clone()).await {
                        Ok(()) => {
                            counters.processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => {
                            error!(job_id = %job.id(), error = %e, "job failed");
                            counters.failed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    if inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
                        all_done.notify_waiters();
                    }
                }
            }));
        }
    }

    /// Submit a job. Returns a distinguishable "queue full" error if the
    /// bounded channel has no room, and "pool closed" if intake is shut.
    pub async fn submit(&self, job: Box<dyn Job>) -> CoreResult<()> {
        let guard = self.sender.lock().await;
        let sender = guard
            .as_ref()
            .ok_or_else(|| CoreError::shutdown("worker pool is closed"))?;
        sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CoreError::contention("worker pool queue full"),
            mpsc::error::TrySendError::Closed(_) => CoreError::shutdown("worker pool is closed"),
        })?;
        self.queue_len.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Park all workers; in-flight jobs complete before parking takes effect.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_waiters();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Propagate cancellation to every worker's in-flight job.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
        self.resume_notify.notify_waiters();
    }

    /// Close intake, wait for workers to drain the queue, then return.
    pub async fn stop(&self) {
        drop(self.sender.lock().await.take());
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            let _ = worker.await;
        }
    }

    /// Block until every submitted job has completed, then shut down
    /// gracefully (equivalent to closing intake and calling `stop`).
    pub async fn wait(&self) {
        drop(self.sender.lock().await.take());
        while self.inflight.load(Ordering::SeqCst) > 0 || self.queue_len.load(Ordering::SeqCst) > 0 {
            self.all_done.notified().await;
        }
        self.stop().await;
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            worker_count: self.worker_count,
            jobs_queued: self.queue_len.load(Ordering::SeqCst) as usize,
            jobs_processed: self.counters.processed.load(Ordering::SeqCst),
            jobs_failed: self.counters.failed.load(Ordering::SeqCst),
            is_paused: self.is_paused(),
        }
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Accumulates jobs and flushes them in chunks, on a size or timer
/// threshold, whichever comes first.
pub struct BatchProcessor<T: Send + 'static> {
    batch_size: usize,
    flush_interval: Duration,
    buffer: Mutex<Vec<T>>,
    last_flush: Mutex<tokio::time::Instant>,
}

impl<T: Send + 'static> BatchProcessor<T> {
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size,
            flush_interval,
            buffer: Mutex::new(Vec::new()),
            last_flush: Mutex::new(tokio::time::Instant::now()),
        }
    }

    /// Push one item. Returns `Some(batch)` if this push crossed the size
    /// or time threshold and the caller should flush the returned batch.
    pub async fn push(&self, item: T) -> Option<Vec<T>> {
        let mut buffer = self.buffer.lock().await;
        buffer.push(item);
        let elapsed = self.last_flush.lock().await.elapsed();
        if buffer.len() >= self.batch_size || elapsed >= self.flush_interval {
            let batch = std::mem::take(&mut *buffer);
            *self.last_flush.lock().await = tokio::time::Instant::now();
            Some(batch)
        } else {
            None
        }
    }

    /// Flush whatever is buffered, regardless of threshold.
    pub async fn flush(&self) -> Vec<T> {
        let mut buffer = self.buffer.lock().await;
        *self.last_flush.lock().await = tokio::time::Instant::now();
        std::mem::take(&mut *buffer)
    }
}

/// Convenience wrapper turning a plain async closure into a [`Job`].
pub struct FnJob<F> {
    id: String,
    f: Mutex<Option<F>>,
}

impl<F> FnJob<F>
where
    F: for<'c> FnOnce(CancellationToken) -> BoxFuture<'c, CoreResult<()>> + Send + 'static,
{
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self {
            id: id.into(),
            f: Mutex::new(Some(f)),
        }
    }
}

#[async_trait]
impl<F> Job for FnJob<F>
where
    F: for<'c> FnOnce(CancellationToken) -> BoxFuture<'c, CoreResult<()>> + Send + 'static,
{
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn execute(&self, cancel: CancellationToken) -> CoreResult<()> {
        let f = self
            .f
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::fatal("FnJob executed more than once"))?;
        f(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingJob {
        id: String,
        counter: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn id(&self) -> String {
            self.id.clone()
        }

        async fn execute(&self, _cancel: CancellationToken) -> CoreResult<()> {
            self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn processes_every_submitted_job() {
        let pool = WorkerPool::new(4, 16);
        pool.start().await;
        let counter = Arc::new(AtomicUsize::new(0));
        for i in 0..20 {
            pool.submit(Box::new(CountingJob {
                id: format!("job-{i}"),
                counter: counter.clone(),
            }))
            .await
            .expect("submit succeeds");
        }
        pool.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(pool.stats().jobs_processed, 20);
    }

    #[tokio::test]
    async fn full_queue_is_a_distinguishable_error() {
        let pool = WorkerPool::new(1, 1);
        pool.start().await;
        pool.pause();
        pool.submit(Box::new(CountingJob {
            id: "first".into(),
            counter: Arc::new(AtomicUsize::new(0)),
        }))
        .await
        .expect("first submit fits in the channel buffer");
        let err = pool
            .submit(Box::new(CountingJob {
                id: "second".into(),
                counter: Arc::new(AtomicUsize::new(0)),
            }))
            .await
            .expect_err("second submit should find the bounded channel full");
        assert!(err.is_contention());
        pool.cancel();
        pool.stop().await;
    }
}
