//! Non-blocking mutual exclusion for whole-catalog scans. Two concurrent
//! scanner passes over the same catalog would race each other's writes
//! through the write queue without corrupting anything, but the result
//! would be nonsensical (interleaved stale-sweep horizons); this lock
//! makes that a user-visible error instead of a silent mess.

use crate::error::{CoreError, CoreResult};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct IndexingLock {
    locked: AtomicBool,
}

impl IndexingLock {
    pub fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Try to acquire the lock. Never blocks.
    pub fn try_lock(&self) -> CoreResult<IndexingGuard<'_>> {
        if self.locked.swap(true, Ordering::AcqRel) {
            Err(CoreError::contention("indexing is already locked"))
        } else {
            Ok(IndexingGuard { lock: self })
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// Releases the indexing lock on drop.
pub struct IndexingGuard<'a> {
    lock: &'a IndexingLock,
}

impl Drop for IndexingGuard<'_> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_fails_while_first_held() {
        let lock = IndexingLock::new();
        let guard = lock.try_lock().expect("first lock succeeds");
        assert!(lock.try_lock().is_err());
        drop(guard);
        assert!(lock.try_lock().is_ok());
    }
}
