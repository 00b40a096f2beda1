// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-record lock guarding identifier reads and writes.
//
// Every configuration record (OE, vendor, module) lives behind one
// `EntityLock`. A reconciliation workflow acquires it once, performs all
// identifier mutation through the returned guard, and releases it when the
// guard drops, including on early `?` returns. Re-acquiring the same lock
// from inside a workflow deadlocks; continue with the guard instead.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::trace;

use crate::error::{MetaError, Result};

/// A mutex bound to one configuration record, with a count of live holders.
#[derive(Debug, Default)]
pub struct EntityLock<T> {
    inner: Mutex<T>,
    refcnt: AtomicU32,
}

impl<T> EntityLock<T> {
    pub fn new(record: T) -> Self {
        Self {
            inner: Mutex::new(record),
            refcnt: AtomicU32::new(0),
        }
    }

    /// Wait until the record is free, then hold it until the guard drops.
    pub async fn acquire(&self) -> LockGuard<'_, T> {
        let guard = self.inner.lock().await;
        let held = self.refcnt.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(held, "entity lock acquired");
        LockGuard {
            guard,
            refcnt: &self.refcnt,
        }
    }

    /// Number of guards currently alive (0 or 1).
    pub fn refcount(&self) -> u32 {
        self.refcnt.load(Ordering::Acquire)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Acquire the lock of an optional record. Fails with `InvalidArgument` when
/// the definition does not carry the record at all.
pub async fn acquire<'a, T>(
    lock: Option<&'a EntityLock<T>>,
    what: &str,
) -> Result<LockGuard<'a, T>> {
    match lock {
        Some(lock) => Ok(lock.acquire().await),
        None => Err(MetaError::InvalidArgument(format!(
            "no {what} record bound to this definition"
        ))),
    }
}

/// Scoped hold on a record. Dereferences to the record itself.
pub struct LockGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    refcnt: &'a AtomicU32,
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        // The mutex itself unlocks when `guard` drops right after this.
        self.refcnt.fetch_sub(1, Ordering::AcqRel);
        trace!("entity lock released");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn guard_tracks_refcount() {
        let lock = EntityLock::new(0u32);
        assert_eq!(lock.refcount(), 0);
        {
            let mut guard = lock.acquire().await;
            *guard = 7;
            assert_eq!(lock.refcount(), 1);
        }
        assert_eq!(lock.refcount(), 0);
        assert_eq!(lock.into_inner(), 7);
    }

    #[tokio::test]
    async fn absent_record_is_invalid_argument() {
        let result = acquire::<u32>(None, "oe").await;
        assert!(matches!(result, Err(MetaError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn same_record_serializes() {
        let lock = Arc::new(EntityLock::new(Vec::<u32>::new()));

        let first = lock.acquire().await;
        let contender = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                let mut guard = lock.acquire().await;
                // Must see the first holder's write.
                let seen = guard.clone();
                guard.push(2);
                seen
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        let mut first = first;
        first.push(1);
        drop(first);

        let seen = contender.await.expect("contender task");
        assert_eq!(seen, vec![1]);
        assert_eq!(*lock.acquire().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn distinct_records_do_not_block() {
        let a = EntityLock::new(1u32);
        let b = EntityLock::new(2u32);

        let _held_a = a.acquire().await;
        let held_b = tokio::time::timeout(Duration::from_millis(100), b.acquire())
            .await
            .expect("second record must not wait on the first");
        assert_eq!(*held_b, 2);
    }
}
