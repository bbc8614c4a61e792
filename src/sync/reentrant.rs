//! Owner-identity recursive mutex.
//!
//! A [`ReentrantLock`] may be acquired repeatedly by the thread that
//! already owns it; each acquisition returns a guard and the lock is
//! released when the last guard drops.
//!
//! # Caller identity
//!
//! Ownership is tracked through a stable non-zero identifier assigned to
//! each thread on its first acquisition (a thread-local registration seeded
//! from a global counter). Two concurrently executing threads never share
//! an identifier.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

/// Identifier source; starts at 1 so 0 can mean "unowned".
static NEXT_CALLER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CALLER_ID: u64 = NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed);
}

/// Returns the calling thread's stable non-zero identifier.
///
/// # Panics
/// Panics if the identity is unavailable (thread teardown).
fn caller_id() -> u64 {
    CALLER_ID
        .try_with(|id| *id)
        .expect("caller identity unavailable")
}

#[derive(Debug)]
struct OwnerState {
    /// Identifier of the owning thread, 0 when unowned.
    owner: u64,
    depth: usize,
}

/// A mutex that the owning thread may acquire recursively.
#[derive(Debug, Default)]
pub struct ReentrantLock {
    state: Mutex<OwnerState>,
    unlocked: Condvar,
}

impl Default for OwnerState {
    fn default() -> Self {
        Self { owner: 0, depth: 0 }
    }
}

impl ReentrantLock {
    /// Creates an unowned lock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, blocking while another thread owns it.
    ///
    /// Reentrant: the owning thread acquires immediately and the depth
    /// grows; the lock is released once every guard has been dropped.
    pub fn lock(&self) -> ReentrantGuard<'_> {
        let current = caller_id();
        let mut state = self.state.lock().expect("reentrant lock poisoned");
        loop {
            if state.owner == 0 {
                state.owner = current;
                state.depth = 1;
                return ReentrantGuard { lock: self };
            }
            if state.owner == current {
                state.depth += 1;
                return ReentrantGuard { lock: self };
            }
            state = self.unlocked.wait(state).expect("reentrant lock poisoned");
        }
    }

    /// Returns the current reentrancy depth of the calling thread, or zero
    /// if it does not own the lock.
    #[must_use]
    pub fn held_depth(&self) -> usize {
        let state = self.state.lock().expect("reentrant lock poisoned");
        if state.owner == caller_id() {
            state.depth
        } else {
            0
        }
    }

    fn unlock(&self) {
        let mut state = self.state.lock().expect("reentrant lock poisoned");
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = 0;
            self.unlocked.notify_one();
        }
    }
}

/// Guard for one acquisition level; dropping it decrements the depth.
#[derive(Debug)]
pub struct ReentrantGuard<'a> {
    lock: &'a ReentrantLock,
}

impl Drop for ReentrantGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
