//! Reusable N-party rendezvous with break semantics.
//!
//! A [`CyclicBarrier`] lets a group of threads wait for each other at a
//! common point. The party completing the group releases everyone and the
//! barrier resets for the next cycle.
//!
//! Each cycle owns a token: a shared outcome cell identified by its `Arc`
//! pointer. Waiters capture the current token under the barrier lock, block
//! on it outside the lock, and consult it again after a cancellation to
//! distinguish a concurrent release from a break they caused themselves.

use std::mem;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::context::Context;
use crate::error::Error;

/// Cancellation poll interval while blocked on a cycle token.
const WAIT_TICK: Duration = Duration::from_millis(10);

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    /// All parties arrived; waiters return success.
    Released,
    /// The cycle was broken by a reset or a cancelled waiter.
    Broken,
}

/// The per-cycle notification token.
#[derive(Debug)]
struct Cycle {
    outcome: Mutex<Option<CycleOutcome>>,
    cvar: Condvar,
}

impl Cycle {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            cvar: Condvar::new(),
        }
    }

    /// Publishes the cycle outcome; the first publication wins.
    fn complete(&self, outcome: CycleOutcome) {
        let mut slot = self.outcome.lock().expect("cycle token poisoned");
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.cvar.notify_all();
    }
}

#[derive(Debug)]
struct BarrierState {
    count: usize,
    cycle: Arc<Cycle>,
}

/// A synchronization point where a fixed number of parties wait for each
/// other, reusable across cycles.
///
/// # Break semantics
///
/// [`CyclicBarrier::reset`] and cancellation of a waiting party's context
/// break the current cycle: every waiting party returns a broken-barrier
/// error, and a fresh cycle begins with zero arrivals. After any complete
/// release or break the barrier is usable again.
#[derive(Debug)]
pub struct CyclicBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
}

impl CyclicBarrier {
    /// Creates a barrier for the given number of parties.
    ///
    /// # Panics
    /// Panics if `parties` is zero.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        assert!(parties >= 1, "cyclic barrier requires at least 1 party");
        Self {
            parties,
            state: Mutex::new(BarrierState {
                count: 0,
                cycle: Arc::new(Cycle::new()),
            }),
        }
    }

    /// Returns the number of parties that must arrive to release a cycle.
    #[must_use]
    pub const fn parties(&self) -> usize {
        self.parties
    }

    /// Returns the number of parties currently waiting at the barrier.
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.state.lock().expect("barrier lock poisoned").count
    }

    /// Waits for all parties to reach the barrier.
    pub fn wait(&self) -> Result<(), Error> {
        self.wait_context(&Context::background())
    }

    /// Waits for all parties to reach the barrier, or for `ctx` to be
    /// cancelled.
    ///
    /// The last party to arrive releases the others, resets the barrier for
    /// the next cycle and returns success. A cancelled waiter breaks the
    /// cycle it belongs to (if nothing resolved it concurrently) and
    /// returns a broken-barrier error carrying the cancellation cause.
    pub fn wait_context(&self, ctx: &Context) -> Result<(), Error> {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        state.count += 1;

        if state.count == self.parties {
            // Last party: release everyone and start a fresh cycle.
            let released = mem::replace(&mut state.cycle, Arc::new(Cycle::new()));
            state.count = 0;
            drop(state);
            released.complete(CycleOutcome::Released);
            tracing::trace!(parties = self.parties, "barrier released");
            return Ok(());
        }

        // Capture the token under the lock, then block outside of it.
        let cycle = Arc::clone(&state.cycle);
        drop(state);

        let mut outcome = cycle.outcome.lock().expect("cycle token poisoned");
        loop {
            if let Some(resolved) = *outcome {
                return Self::cycle_result(resolved);
            }

            if ctx.is_cancelled() {
                drop(outcome);
                return self.wait_cancelled(ctx, &cycle);
            }

            let (next, _) = cycle
                .cvar
                .wait_timeout(outcome, WAIT_TICK)
                .expect("cycle token poisoned");
            outcome = next;
        }
    }

    /// Resolves a cancelled wait against the captured cycle token.
    fn wait_cancelled(&self, ctx: &Context, cycle: &Arc<Cycle>) -> Result<(), Error> {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        // Break only if the captured cycle is still current; otherwise a
        // release or break arrived concurrently and its outcome stands.
        if Arc::ptr_eq(&state.cycle, cycle) {
            Self::break_cycle(&mut state);
        }
        drop(state);

        let outcome = cycle.outcome.lock().expect("cycle token poisoned");
        match *outcome {
            Some(CycleOutcome::Released) => Ok(()),
            Some(CycleOutcome::Broken) => {
                let broken = Error::broken_barrier();
                Err(match ctx.cause() {
                    Some(cause) => broken.with_source(cause),
                    None => broken,
                })
            }
            None => {
                let cause = ctx.cause().unwrap_or_else(|| Error::cancelled());
                Err(Error::broken_barrier().with_source(cause))
            }
        }
    }

    /// Breaks the barrier if any party is waiting, then starts a new cycle.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("barrier lock poisoned");
        Self::break_cycle(&mut state);
    }

    fn break_cycle(state: &mut BarrierState) {
        if state.count == 0 {
            return;
        }
        let broken = mem::replace(&mut state.cycle, Arc::new(Cycle::new()));
        state.count = 0;
        broken.complete(CycleOutcome::Broken);
        tracing::trace!("barrier broken");
    }

    fn cycle_result(outcome: CycleOutcome) -> Result<(), Error> {
        match outcome {
            CycleOutcome::Released => Ok(()),
            CycleOutcome::Broken => Err(Error::broken_barrier()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn all_parties_release_together() {
        init_test("all_parties_release_together");
        let barrier = Arc::new(CyclicBarrier::new(3));
        let successes = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let barrier = Arc::clone(&barrier);
            let successes = Arc::clone(&successes);
            handles.push(thread::spawn(move || {
                if barrier.wait().is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("party thread");
        }

        let released = successes.load(Ordering::SeqCst);
        crate::assert_with_log!(released == 3, "released parties", 3usize, released);
        crate::test_complete!("all_parties_release_together");
    }

    #[test]
    fn single_party_returns_immediately() {
        init_test("single_party_returns_immediately");
        let barrier = CyclicBarrier::new(1);
        for _ in 0..5 {
            barrier.wait().expect("parties=1 always releases");
        }
        crate::test_complete!("single_party_returns_immediately");
    }

    #[test]
    fn barrier_is_reusable_across_cycles() {
        init_test("barrier_is_reusable_across_cycles");
        let barrier = Arc::new(CyclicBarrier::new(2));

        for _ in 0..3 {
            let other = Arc::clone(&barrier);
            let handle = thread::spawn(move || other.wait());
            barrier.wait().expect("cycle releases");
            handle.join().expect("party thread").expect("cycle releases");
        }
        crate::test_complete!("barrier_is_reusable_across_cycles");
    }

    #[test]
    fn reset_breaks_waiting_parties() {
        init_test("reset_breaks_waiting_parties");
        let barrier = Arc::new(CyclicBarrier::new(5));
        let broken = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let barrier = Arc::clone(&barrier);
            let broken = Arc::clone(&broken);
            handles.push(thread::spawn(move || {
                let err = barrier.wait().expect_err("reset breaks the cycle");
                if err.is_broken_barrier() {
                    broken.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }

        // Let the three parties arrive.
        while barrier.waiting() < 3 {
            thread::sleep(Duration::from_millis(5));
        }
        barrier.reset();

        for handle in handles {
            handle.join().expect("party thread");
        }
        let observed = broken.load(Ordering::SeqCst);
        crate::assert_with_log!(observed == 3, "broken observations", 3usize, observed);

        // The next full cycle succeeds.
        let successes = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..5 {
            let barrier = Arc::clone(&barrier);
            let successes = Arc::clone(&successes);
            handles.push(thread::spawn(move || {
                if barrier.wait().is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("party thread");
        }
        let released = successes.load(Ordering::SeqCst);
        crate::assert_with_log!(released == 5, "fresh cycle released", 5usize, released);
        crate::test_complete!("reset_breaks_waiting_parties");
    }

    #[test]
    fn reset_without_waiters_is_a_no_op() {
        init_test("reset_without_waiters_is_a_no_op");
        let barrier = Arc::new(CyclicBarrier::new(2));
        barrier.reset();

        let other = Arc::clone(&barrier);
        let handle = thread::spawn(move || other.wait());
        barrier.wait().expect("unaffected cycle");
        handle.join().expect("party thread").expect("unaffected cycle");
        crate::test_complete!("reset_without_waiters_is_a_no_op");
    }

    #[test]
    fn cancelled_waiter_breaks_the_cycle() {
        init_test("cancelled_waiter_breaks_the_cycle");
        let barrier = Arc::new(CyclicBarrier::new(3));
        let ctx = Context::new();

        let waiter_barrier = Arc::clone(&barrier);
        let waiter_ctx = ctx.clone();
        let cancelled = thread::spawn(move || waiter_barrier.wait_context(&waiter_ctx));

        let bystander_barrier = Arc::clone(&barrier);
        let bystander = thread::spawn(move || bystander_barrier.wait());

        while barrier.waiting() < 2 {
            thread::sleep(Duration::from_millis(5));
        }
        ctx.cancel();

        let err = cancelled
            .join()
            .expect("waiter thread")
            .expect_err("cancelled waiter observes break");
        crate::assert_with_log!(
            err.is_broken_barrier(),
            "broken barrier",
            true,
            err.is_broken_barrier()
        );

        let err = bystander
            .join()
            .expect("bystander thread")
            .expect_err("bystander observes break");
        assert!(err.is_broken_barrier());

        // Counter was reset; a full group succeeds afterwards.
        assert_eq!(barrier.waiting(), 0);
        crate::test_complete!("cancelled_waiter_breaks_the_cycle");
    }

    #[test]
    fn last_arrival_beats_concurrent_cancellation() {
        init_test("last_arrival_beats_concurrent_cancellation");
        let barrier = Arc::new(CyclicBarrier::new(2));
        let ctx = Context::new();
        ctx.cancel();

        // The cancelled context only matters while blocked; if the cycle is
        // already resolved the resolution wins.
        let other = Arc::clone(&barrier);
        let handle = thread::spawn(move || other.wait());
        while barrier.waiting() < 1 {
            thread::sleep(Duration::from_millis(5));
        }
        barrier
            .wait_context(&ctx)
            .expect("last arrival releases regardless of context");
        handle.join().expect("party thread").expect("released");
        crate::test_complete!("last_arrival_beats_concurrent_cancellation");
    }

    #[test]
    #[should_panic(expected = "at least 1 party")]
    fn zero_parties_is_rejected() {
        let _ = CyclicBarrier::new(0);
    }
}
