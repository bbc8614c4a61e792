//! Counting rendezvous with external cancellation.
//!
//! A [`WaitGroupContext`] waits for a collection of activities to finish.
//! One side calls [`WaitGroupContext::add`] to announce work and
//! [`WaitGroupContext::done`] as it completes; [`WaitGroupContext::wait`]
//! blocks until the counter reaches zero or the group's context is
//! cancelled.
//!
//! # State encoding
//!
//! The counter (high 32 bits) and the waiter count (low 32 bits) live in a
//! single atomic word, so a waiter registers with a snapshot that is
//! consistent with the counter it observed. That closes the race where a
//! group is reused by an `add` while a previous `wait` is still parked: the
//! release zeroes the whole word, and a normally-woken waiter that sees a
//! nonzero word knows the group was reused too early.

// The packed-word encoding reinterprets the counter half as i32 on purpose.
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::context::Context;

/// Cancellation poll interval while parked.
const WAIT_TICK: Duration = Duration::from_millis(10);

const fn counter_of(state: u64) -> i32 {
    ((state >> 32) as u32) as i32
}

const fn waiters_of(state: u64) -> u32 {
    state as u32
}

/// A counting rendezvous bound to a cancellation context.
///
/// Reuse is permitted once all waiters of the previous generation have
/// returned.
#[derive(Debug)]
pub struct WaitGroupContext {
    ctx: Context,
    /// counter << 32 | waiters
    state: AtomicU64,
    /// Release generation, bumped under the mutex on every 0-transition.
    generation: Mutex<u64>,
    released: Condvar,
}

impl WaitGroupContext {
    /// Creates a wait group observing `ctx` for cancellation.
    #[must_use]
    pub fn new(ctx: &Context) -> Self {
        Self {
            ctx: ctx.clone(),
            state: AtomicU64::new(0),
            generation: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Adds `delta`, which may be negative, to the counter.
    ///
    /// A transition to zero releases every currently registered waiter.
    ///
    /// # Panics
    /// Panics if the counter becomes negative.
    pub fn add(&self, delta: i32) {
        let packed = u64::from(delta as u32) << 32;
        let mut observed = self.state.fetch_add(packed, Ordering::AcqRel).wrapping_add(packed);

        let counter = counter_of(observed);
        assert!(counter >= 0, "negative wait group counter: {counter}");
        if counter > 0 {
            return;
        }

        // 0-transition: claim the word (counter and waiter count together)
        // and wake exactly the waiters captured in it.
        while waiters_of(observed) > 0 {
            match self.state.compare_exchange(
                observed,
                0,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    let waiters = waiters_of(observed);
                    let mut generation =
                        self.generation.lock().expect("wait group lock poisoned");
                    *generation = generation.wrapping_add(1);
                    self.released.notify_all();
                    drop(generation);
                    tracing::trace!(waiters, "wait group released");
                    return;
                }
                Err(actual) => {
                    observed = actual;
                    if counter_of(observed) != 0 {
                        return;
                    }
                }
            }
        }
    }

    /// Decrements the counter by one.
    pub fn done(&self) {
        self.add(-1);
    }

    /// Blocks until the counter reaches zero or the context is cancelled.
    ///
    /// # Panics
    /// Panics if the group is reused (counter raised again) before this
    /// waiter has returned from a release.
    pub fn wait(&self) {
        loop {
            let snapshot = self.state.load(Ordering::Acquire);
            if counter_of(snapshot) == 0 {
                return;
            }

            // Take the generation lock before registering so a release that
            // happens right after the registration cannot complete (and bump
            // the generation) until this waiter is parked.
            let mut generation = self.generation.lock().expect("wait group lock poisoned");
            if self
                .state
                .compare_exchange(snapshot, snapshot + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                drop(generation);
                continue;
            }

            let registered_at = *generation;
            loop {
                let (next, _) = self
                    .released
                    .wait_timeout(generation, WAIT_TICK)
                    .expect("wait group lock poisoned");
                generation = next;

                if *generation != registered_at {
                    assert!(
                        self.state.load(Ordering::Acquire) == 0,
                        "wait group reused before previous wait returned"
                    );
                    return;
                }
                if self.ctx.is_cancelled() {
                    // The registered waiter slot stays claimed; the next
                    // release zeroes the word regardless.
                    return;
                }
            }
        }
    }
}
