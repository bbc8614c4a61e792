//! Idempotent, panic-tolerant single invocation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Once as StdOnce, OnceLock};

use crate::error::{Error, Result};

/// Executes a fallible callable exactly once and caches its outcome.
///
/// Concurrent callers during the first execution block until it finishes;
/// every caller observes the same cached result. A panic inside the
/// callable is captured, converted to an error, and cached; the instance
/// still counts as executed.
#[derive(Debug)]
pub struct Once<T> {
    guard: StdOnce,
    result: OnceLock<Result<T>>,
}

impl<T> Default for Once<T> {
    fn default() -> Self {
        Self {
            guard: StdOnce::new(),
            result: OnceLock::new(),
        }
    }
}

impl<T: Clone> Once<T> {
    /// Creates an instance that has not yet executed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `f` if and only if this is the first call on this instance.
    ///
    /// Subsequent calls return the cached outcome of the first execution,
    /// even when given a different callable.
    pub fn call_once<F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        self.guard.call_once(|| {
            let outcome = catch_unwind(AssertUnwindSafe(f))
                .unwrap_or_else(|payload| Err(Error::panicked(payload.as_ref())));
            let _ = self.result.set(outcome);
        });
        self.result
            .get()
            .cloned()
            .expect("once outcome cached after first call")
    }

    /// Returns true once the callable has executed (or panicked).
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.guard.is_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn later_callables_never_run() {
        init_test("later_callables_never_run");
        let once = Once::new();
        let first = once.call_once(|| Ok(1)).expect("first result");
        let second = once.call_once(|| Ok(2)).expect("cached result");
        crate::assert_with_log!(first == 1, "first call", 1, first);
        crate::assert_with_log!(second == 1, "cached call", 1, second);
        assert!(once.is_completed());
        crate::test_complete!("later_callables_never_run");
    }

    #[test]
    fn concurrent_callers_share_one_execution() {
        init_test("concurrent_callers_share_one_execution");
        let once = Arc::new(Once::new());
        let executions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let once = Arc::clone(&once);
            let executions = Arc::clone(&executions);
            handles.push(thread::spawn(move || {
                once.call_once(|| {
                    executions.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(10));
                    Ok(7)
                })
                .expect("shared result")
            }));
        }

        for handle in handles {
            let value = handle.join().expect("caller thread");
            assert_eq!(value, 7);
        }
        let ran = executions.load(Ordering::SeqCst);
        crate::assert_with_log!(ran == 1, "single execution", 1usize, ran);
        crate::test_complete!("concurrent_callers_share_one_execution");
    }

    #[test]
    fn error_outcomes_are_cached_too() {
        init_test("error_outcomes_are_cached_too");
        let once: Once<i32> = Once::new();
        let err = once
            .call_once(|| Err(Error::other("first failed")))
            .expect_err("first error");
        assert!(err.to_string().contains("first failed"));

        // The error is the cached outcome; the new callable never runs.
        let err = once.call_once(|| Ok(5)).expect_err("cached error");
        assert!(err.to_string().contains("first failed"));
        crate::test_complete!("error_outcomes_are_cached_too");
    }

    #[test]
    fn panics_become_cached_errors() {
        init_test("panics_become_cached_errors");
        let once: Once<i32> = Once::new();
        let err = once
            .call_once(|| panic!("callable exploded"))
            .expect_err("panic captured");
        assert!(err.is_panic());
        assert!(err.to_string().contains("callable exploded"));
        assert!(once.is_completed());

        let err = once.call_once(|| Ok(5)).expect_err("still the panic");
        assert!(err.is_panic());
        crate::test_complete!("panics_become_cached_errors");
    }
}
