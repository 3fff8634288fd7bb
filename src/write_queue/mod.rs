//! Single-writer serialization queue.
//!
//! Every catalog mutation passes through here so that the embedded
//! single-writer store never observes two concurrent writers. A bounded
//! FIFO channel holds queued operations; one worker task pops and runs
//! them to completion, one at a time, before taking the next.

use crate::error::{CoreError, CoreResult};
use crate::config::WriteQueueConfig;
use futures::FutureExt;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A closure that receives a borrowed handle to the store (a connection or
/// an open transaction) and returns whether the mutation succeeded.
pub type AsyncOp<T> = Box<dyn for<'c> FnOnce(&'c T) -> BoxFuture<'c, CoreResult<()>> + Send>;

/// Cooperative cancellation signal a caller can use to stop waiting on a
/// queued op's result. `None` (the default for `submit`'s `ctx` argument)
/// means "never cancelled".
pub type Cancel = Option<watch::Receiver<bool>>;

async fn wait_cancelled(cancel: &Cancel) {
    match cancel {
        Some(rx) => {
            let mut rx = rx.clone();
            loop {
                if *rx.borrow() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped; will never cancel.
                    std::future::pending::<()>().await;
                }
            }
        }
        None => std::future::pending::<()>().await,
    }
}

enum Message {
    Plain {
        op: AsyncOp<DatabaseConnection>,
        result_tx: oneshot::Sender<CoreResult<()>>,
    },
    Transactional {
        op: AsyncOp<DatabaseTransaction>,
        result_tx: oneshot::Sender<CoreResult<()>>,
    },
}

/// The single serialization point for catalog mutations.
pub struct WriteQueue {
    conn: DatabaseConnection,
    config: WriteQueueConfig,
    sender: Mutex<Option<mpsc::Sender<Message>>>,
    started: Arc<AtomicBool>,
    queue_len: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteQueue {
    pub fn new(conn: DatabaseConnection, config: WriteQueueConfig) -> Self {
        Self {
            conn,
            config,
            sender: Mutex::new(None),
            started: Arc::new(AtomicBool::new(false)),
            queue_len: Arc::new(AtomicUsize::new(0)),
            worker: Mutex::new(None),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn queue_length(&self) -> usize {
        self.queue_len.load(Ordering::SeqCst)
    }

    /// Idempotent: calling `start` while already started is a no-op.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let (tx, mut rx) = mpsc::channel::<Message>(self.config.queue_size);
        *self.sender.lock().await = Some(tx);

        let conn = self.conn.clone();
        let write_timeout = self.config.write_timeout;
        let queue_len = self.queue_len.clone();

        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                queue_len.fetch_sub(1, Ordering::SeqCst);
                match message {
                    Message::Plain { op, result_tx } => {
                        let result = run_with_watchdog(op(&conn), write_timeout).await;
                        deliver(result_tx, result);
                    }
                    Message::Transactional { op, result_tx } => {
                        let result = run_transactional(&conn, op, write_timeout).await;
                        deliver(result_tx, result);
                    }
                }
            }
            debug!("write queue worker drained and exiting");
        });

        *self.worker.lock().await = Some(handle);
    }

    /// Closes intake, drains the queue, then returns. Calling `stop` when
    /// not started is a no-op.
    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        drop(self.sender.lock().await.take());
        if let Some(handle) = self.worker.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Enqueue a plain operation. Blocks until the op completes, the
    /// `ctx` cancellation fires, or the queue shuts down underneath the
    /// caller.
    pub async fn submit(&self, ctx: Cancel, op: AsyncOp<DatabaseConnection>) -> CoreResult<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.enqueue(Message::Plain { op, result_tx }).await?;
        self.await_result(ctx, result_rx).await
    }

    /// Like [`Self::submit`], but `op` runs inside a transaction that the
    /// queue begins, commits on success, and rolls back on error (including
    /// a caught panic).
    pub async fn submit_tx(
        &self,
        ctx: Cancel,
        op: AsyncOp<DatabaseTransaction>,
    ) -> CoreResult<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.enqueue(Message::Transactional { op, result_tx }).await?;
        self.await_result(ctx, result_rx).await
    }

    async fn enqueue(&self, message: Message) -> CoreResult<()> {
        let guard = self.sender.lock().await;
        let sender = guard
            .as_ref()
            .ok_or_else(|| CoreError::shutdown("write queue is not started"))?;
        sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => CoreError::contention("write queue full"),
            mpsc::error::TrySendError::Closed(_) => {
                CoreError::shutdown("write queue is shutting down")
            }
        })?;
        self.queue_len.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Convenience wrapper over [`Self::submit`] for ops that need to hand
    /// a computed value back to the caller rather than just success/failure.
    /// The value travels out through a side cell written just before the op
    /// reports success, which is safe because the op and the cell write
    /// happen-before the `submit` future resolves.
    pub async fn submit_value<T, F>(&self, ctx: Cancel, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseConnection) -> BoxFuture<'c, CoreResult<T>> + Send + 'static,
    {
        let out: Arc<std::sync::Mutex<Option<T>>> = Arc::new(std::sync::Mutex::new(None));
        let out2 = out.clone();
        let op: AsyncOp<DatabaseConnection> = Box::new(move |conn| {
            Box::pin(async move {
                let value = f(conn).await?;
                *out2.lock().expect("write queue value cell poisoned") = Some(value);
                Ok(())
            })
        });
        self.submit(ctx, op).await?;
        Ok(out
            .lock()
            .expect("write queue value cell poisoned")
            .take()
            .expect("op reported success but produced no value"))
    }

    /// Transactional counterpart of [`Self::submit_value`].
    pub async fn submit_tx_value<T, F>(&self, ctx: Cancel, f: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, CoreResult<T>> + Send + 'static,
    {
        let out: Arc<std::sync::Mutex<Option<T>>> = Arc::new(std::sync::Mutex::new(None));
        let out2 = out.clone();
        let op: AsyncOp<DatabaseTransaction> = Box::new(move |txn| {
            Box::pin(async move {
                let value = f(txn).await?;
                *out2.lock().expect("write queue value cell poisoned") = Some(value);
                Ok(())
            })
        });
        self.submit_tx(ctx, op).await?;
        Ok(out
            .lock()
            .expect("write queue value cell poisoned")
            .take()
            .expect("op reported success but produced no value"))
    }

    async fn await_result(
        &self,
        ctx: Cancel,
        result_rx: oneshot::Receiver<CoreResult<()>>,
    ) -> CoreResult<()> {
        tokio::select! {
            res = result_rx => res.map_err(|_| CoreError::shutdown("write queue worker dropped the result"))?,
            _ = wait_cancelled(&ctx) => Err(CoreError::contention("submission cancelled")),
        }
    }
}

async fn run_with_watchdog(
    fut: BoxFuture<'_, CoreResult<()>>,
    write_timeout: std::time::Duration,
) -> CoreResult<()> {
    match tokio::time::timeout(write_timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CoreError::fatal(panic_message(panic))),
        Err(_elapsed) => Err(CoreError::contention("write operation timed out")),
    }
}

async fn run_transactional(
    conn: &DatabaseConnection,
    op: AsyncOp<DatabaseTransaction>,
    write_timeout: std::time::Duration,
) -> CoreResult<()> {
    let txn = conn.begin().await?;
    let fut = op(&txn);
    let result = match tokio::time::timeout(write_timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CoreError::fatal(panic_message(panic))),
        Err(_elapsed) => Err(CoreError::contention("write operation timed out")),
    };
    match result {
        Ok(()) => {
            txn.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                error!(%rollback_err, "rollback after failed transactional op also failed");
            }
            Err(e)
        }
    }
}

fn deliver(result_tx: oneshot::Sender<CoreResult<()>>, result: CoreResult<()>) {
    if result_tx.send(result).is_err() {
        warn!("write queue caller went away before the result could be delivered");
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("op panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("op panicked: {s}")
    } else {
        "op panicked".to_string()
    }
}
