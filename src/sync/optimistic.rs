//! Reader-writer lock with a stamp-validated optimistic read path.
//!
//! In addition to the usual exclusive and shared modes, an
//! [`OptimisticLock`] supports reads that take no lock at all:
//!
//! ```ignore
//! let lock = OptimisticLock::new();
//! loop {
//!     let stamp = lock.optimistic_read();
//!     // ... read the protected data ...
//!     if lock.validate(stamp) {
//!         break; // no writer interfered; the read is consistent
//!     }
//!     // retry, or fall back to lock.read()
//! }
//! ```
//!
//! The lock provides validation, not atomicity of the read itself: a
//! successful [`OptimisticLock::validate`] means no writer held the lock
//! since the stamp was taken. Every writer unlock issues a fresh, strictly
//! greater stamp.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

/// A reader-writer lock extended with optimistic read validation.
///
/// Not reentrant.
#[derive(Debug, Default)]
pub struct OptimisticLock {
    rw: RwLock<()>,
    stamp: AtomicU64,
    writing: AtomicBool,
}

impl OptimisticLock {
    /// Creates an unlocked instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for writing.
    ///
    /// Optimistic validation fails for the whole time the guard is held.
    pub fn write(&self) -> OptimisticWriteGuard<'_> {
        let inner = self
            .rw
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        self.writing.store(true, Ordering::Release);
        OptimisticWriteGuard { lock: self, inner }
    }

    /// Acquires the lock for reading; excludes writers but not other
    /// readers.
    pub fn read(&self) -> OptimisticReadGuard<'_> {
        OptimisticReadGuard {
            inner: self.rw.read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Snapshots the current stamp. Never blocks.
    #[must_use]
    pub fn optimistic_read(&self) -> u64 {
        self.stamp.load(Ordering::Acquire)
    }

    /// Returns true iff no writer has held the lock since `stamp` was
    /// taken. Never blocks.
    ///
    /// On failure the caller should retry or fall back to
    /// [`OptimisticLock::read`]; the scheduler is yielded to give a writer
    /// room to finish.
    #[must_use]
    pub fn validate(&self, stamp: u64) -> bool {
        if !self.writing.load(Ordering::Acquire) && stamp == self.stamp.load(Ordering::Acquire) {
            return true;
        }
        thread::yield_now();
        false
    }
}

/// Exclusive guard; dropping it publishes a fresh stamp before release.
#[derive(Debug)]
pub struct OptimisticWriteGuard<'a> {
    lock: &'a OptimisticLock,
    #[allow(dead_code)]
    inner: RwLockWriteGuard<'a, ()>,
}

impl Drop for OptimisticWriteGuard<'_> {
    fn drop(&mut self) {
        // Stamp first, then clear the writing flag; `inner` is released
        // after this body, so validators never see a stale stamp with the
        // flag already clear.
        self.lock.stamp.fetch_add(1, Ordering::AcqRel);
        self.lock.writing.store(false, Ordering::Release);
    }
}

/// Shared guard returned by [`OptimisticLock::read`].
#[derive(Debug)]
pub struct OptimisticReadGuard<'a> {
    #[allow(dead_code)]
    inner: RwLockReadGuard<'a, ()>,
}
