//! Mutex granting the lock by integer priority level.
//!
//! A [`PriorityLock`] is a non-reentrant mutex whose acquisition takes a
//! priority in `1..=max_priority`. On release the token is handed to the
//! highest non-empty priority level; only when no one is waiting does the
//! lock become idle. Lower priority levels can starve under sustained
//! higher-priority traffic; that is the intended trade-off.

use std::sync::{Condvar, Mutex};

/// Hard upper bound on the configurable maximum priority.
const PRIORITY_LIMIT: usize = 1024;

#[derive(Debug)]
struct PriorityState {
    /// True while some guard holds the token (including during handoff).
    held: bool,
    /// Waiters per priority level, index 0 = priority 1.
    waiting: Vec<usize>,
    /// Unconsumed grants per priority level.
    granted: Vec<usize>,
}

/// A mutex that releases to the highest-priority waiter first.
#[derive(Debug)]
pub struct PriorityLock {
    max_priority: usize,
    state: Mutex<PriorityState>,
    /// One condvar per priority level, so a handoff wakes only that level.
    levels: Vec<Condvar>,
}

impl PriorityLock {
    /// Creates a lock accepting priorities in `1..=max_priority`.
    ///
    /// # Panics
    /// Panics if `max_priority` is zero or exceeds the hard limit of 1024.
    #[must_use]
    pub fn new(max_priority: usize) -> Self {
        assert!(
            max_priority >= 1,
            "nonpositive maximum priority: {max_priority}"
        );
        assert!(
            max_priority <= PRIORITY_LIMIT,
            "maximum priority {max_priority} exceeds hard limit of {PRIORITY_LIMIT}"
        );
        Self {
            max_priority,
            state: Mutex::new(PriorityState {
                held: false,
                waiting: vec![0; max_priority],
                granted: vec![0; max_priority],
            }),
            levels: (0..max_priority).map(|_| Condvar::new()).collect(),
        }
    }

    /// Returns the maximum accepted priority level.
    #[must_use]
    pub const fn max_priority(&self) -> usize {
        self.max_priority
    }

    /// Acquires the lock at the highest priority.
    pub fn lock(&self) -> PriorityGuard<'_> {
        self.lock_with_priority(self.max_priority)
    }

    /// Acquires the lock at the given priority.
    ///
    /// Out-of-range priorities are clamped into `1..=max_priority`. Blocks
    /// until the token is granted; requests at higher priority levels are
    /// served first.
    pub fn lock_with_priority(&self, priority: usize) -> PriorityGuard<'_> {
        let level = priority.clamp(1, self.max_priority) - 1;

        let mut state = self.state.lock().expect("priority lock poisoned");
        if !state.held {
            state.held = true;
            return PriorityGuard { lock: self };
        }

        state.waiting[level] += 1;
        loop {
            state = self.levels[level]
                .wait(state)
                .expect("priority lock poisoned");
            if state.granted[level] > 0 {
                state.granted[level] -= 1;
                state.waiting[level] -= 1;
                // `held` stays true: the token was handed over directly.
                return PriorityGuard { lock: self };
            }
        }
    }

    fn unlock(&self) {
        let mut state = self.state.lock().expect("priority lock poisoned");
        for level in (0..self.max_priority).rev() {
            if state.waiting[level] > state.granted[level] {
                state.granted[level] += 1;
                self.levels[level].notify_one();
                return;
            }
        }
        state.held = false;
    }
}

/// Guard returned by the lock methods; releases the token on drop.
#[derive(Debug)]
pub struct PriorityGuard<'a> {
    lock: &'a PriorityLock,
}

impl Drop for PriorityGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn acquisitions_follow_priority_order() {
        init_test("acquisitions_follow_priority_order");
        let lock = Arc::new(PriorityLock::new(5));
        let order = Arc::new(Mutex::new(Vec::new()));

        // Pre-acquire so every contender has to queue.
        let guard = lock.lock();

        let mut handles = Vec::new();
        for _ in 0..10 {
            for priority in (1..=5).rev() {
                let lock = Arc::clone(&lock);
                let order = Arc::clone(&order);
                handles.push(thread::spawn(move || {
                    let _guard = lock.lock_with_priority(priority);
                    order.lock().expect("order lock").push(priority);
                }));
            }
        }

        // Let all contenders park before releasing.
        thread::sleep(Duration::from_millis(100));
        drop(guard);

        for handle in handles {
            handle.join().expect("contender thread");
        }

        let recorded = order.lock().expect("order lock").clone();
        let mut expected = Vec::new();
        for priority in (1..=5).rev() {
            expected.extend(std::iter::repeat(priority).take(10));
        }
        crate::assert_with_log!(recorded == expected, "priority order", expected, recorded);
        crate::test_complete!("acquisitions_follow_priority_order");
    }

    #[test]
    fn out_of_range_priorities_are_clamped() {
        init_test("out_of_range_priorities_are_clamped");
        let lock = PriorityLock::new(2);
        drop(lock.lock_with_priority(0));
        drop(lock.lock_with_priority(2048));
        crate::test_complete!("out_of_range_priorities_are_clamped");
    }

    #[test]
    fn single_level_degenerates_to_a_mutex() {
        init_test("single_level_degenerates_to_a_mutex");
        let lock = Arc::new(PriorityLock::new(1));
        let counter = Arc::new(Mutex::new(0_u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let _guard = lock.lock();
                    *counter.lock().expect("counter lock") += 1;
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker thread");
        }

        let total = *counter.lock().expect("counter lock");
        crate::assert_with_log!(total == 800, "mutual exclusion held", 800u32, total);
        crate::test_complete!("single_level_degenerates_to_a_mutex");
    }

    #[test]
    fn uncontended_lock_is_immediate() {
        init_test("uncontended_lock_is_immediate");
        let lock = PriorityLock::new(4);
        drop(lock.lock());
        drop(lock.lock_with_priority(2));
        drop(lock.lock());
        crate::test_complete!("uncontended_lock_is_immediate");
    }

    #[test]
    #[should_panic(expected = "nonpositive maximum priority")]
    fn zero_max_priority_is_rejected() {
        let _ = PriorityLock::new(0);
    }

    #[test]
    #[should_panic(expected = "exceeds hard limit")]
    fn excessive_max_priority_is_rejected() {
        let _ = PriorityLock::new(2048);
    }
}
