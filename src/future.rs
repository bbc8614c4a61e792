//! Single-assignment result cells with blocking readers.
//!
//! A [`Promise`] is the exclusive writer of exactly one [`Future`]. The
//! future is a cloneable handle onto a shared completion cell; any number of
//! readers may block on it and all of them observe the same outcome.
//!
//! # Completion model
//!
//! Completion happens exactly once. The first of [`Promise::success`] /
//! [`Promise::failure`] wins; later attempts are silently discarded.
//! Completion is a happens-before edge to every reader's return.
//!
//! # Transformations
//!
//! [`Future::map`], [`Future::flat_map`], [`Future::recover`] and
//! [`Future::recover_with`] return immediately with a fresh pending future;
//! a background thread blocks on the upstream and completes the downstream.
//! Upstream errors propagate untouched when no transformation applies.
//!
//! # Deadlines
//!
//! [`Future::get`] bounds the wait for the calling reader only. A deadline
//! expiry produces a timeout error for that caller and leaves the cell
//! completable; readers with different deadlines time out independently.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// The shared completion cell behind a promise/future pair.
///
/// The outcome slot is written at most once under the mutex; the condvar
/// wakes blocked readers. Readers re-check the slot under the same mutex,
/// so a wakeup can never be missed.
struct Shared<T> {
    state: Mutex<Option<Result<T>>>,
    cvar: Condvar,
}

impl<T> Shared<T> {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
            cvar: Condvar::new(),
        }
    }

    /// Installs the outcome if the cell is still pending.
    ///
    /// Returns false (and drops `outcome`) if the cell was already complete.
    fn complete(&self, outcome: Result<T>) -> bool {
        let mut state = self.state.lock().expect("future state poisoned");
        if state.is_some() {
            return false;
        }
        *state = Some(outcome);
        self.cvar.notify_all();
        true
    }

    fn is_complete(&self) -> bool {
        self.state.lock().expect("future state poisoned").is_some()
    }

    fn wait(&self) -> Result<T>
    where
        T: Clone,
    {
        let mut state = self.state.lock().expect("future state poisoned");
        loop {
            if let Some(result) = state.as_ref() {
                return result.clone();
            }
            state = self.cvar.wait(state).expect("future state poisoned");
        }
    }

    fn wait_deadline(&self, timeout: Duration) -> Option<Result<T>>
    where
        T: Clone,
    {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().expect("future state poisoned");
        loop {
            if let Some(result) = state.as_ref() {
                return Some(result.clone());
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (next, _) = self
                .cvar
                .wait_timeout(state, remaining)
                .expect("future state poisoned");
            state = next;
        }
    }
}

/// A value that may not be available yet, or an error if it could not be
/// produced.
///
/// Handles are cheap to clone; all clones read the same completion cell.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("complete", &self.shared.is_complete())
            .finish()
    }
}

impl<T: Clone> Future<T> {
    /// Blocks until the future completes and returns its outcome.
    pub fn join(&self) -> Result<T> {
        self.shared.wait()
    }

    /// Blocks until the future completes or `timeout` elapses.
    ///
    /// On expiry the caller receives a timeout error; the cell itself is
    /// untouched and other readers are unaffected.
    pub fn get(&self, timeout: Duration) -> Result<T> {
        self.shared
            .wait_deadline(timeout)
            .unwrap_or_else(|| Err(Error::timeout(timeout)))
    }

    /// Returns the outcome if the future has already completed.
    #[must_use]
    pub fn try_join(&self) -> Option<Result<T>> {
        self.shared
            .state
            .lock()
            .expect("future state poisoned")
            .clone()
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Returns a future holding `f` applied to this future's successful
    /// result; a failure is propagated unchanged.
    pub fn map<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(T) -> Result<T> + Send + 'static,
    {
        let upstream = self.clone();
        let promise = Promise::new();
        let downstream = promise.future();
        thread::spawn(move || {
            let outcome = match upstream.join() {
                Ok(value) => f(value),
                Err(e) => Err(e),
            };
            promise.complete(outcome);
        });
        downstream
    }

    /// Returns a future that adopts the outcome of the future produced by
    /// `f` from this future's successful result.
    ///
    /// If `f` itself fails, or the upstream failed, that error is the
    /// outcome.
    pub fn flat_map<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce(T) -> Result<Future<T>> + Send + 'static,
    {
        let upstream = self.clone();
        let promise = Promise::new();
        let downstream = promise.future();
        thread::spawn(move || {
            let outcome = match upstream.join() {
                Ok(value) => match f(value) {
                    Ok(inner) => inner.join(),
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            promise.complete(outcome);
        });
        downstream
    }

    /// Returns a future that replaces an upstream failure with the result of
    /// `f`; an upstream success passes through unchanged.
    pub fn recover<F>(&self, f: F) -> Future<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let upstream = self.clone();
        let promise = Promise::new();
        let downstream = promise.future();
        thread::spawn(move || {
            let outcome = match upstream.join() {
                Ok(value) => Ok(value),
                Err(_) => f(),
            };
            promise.complete(outcome);
        });
        downstream
    }

    /// Returns a future that replaces an upstream failure with the outcome
    /// of `other`; an upstream success passes through unchanged.
    pub fn recover_with(&self, other: Future<T>) -> Future<T> {
        let upstream = self.clone();
        let promise = Promise::new();
        let downstream = promise.future();
        thread::spawn(move || {
            let outcome = match upstream.join() {
                Ok(value) => Ok(value),
                Err(_) => other.join(),
            };
            promise.complete(outcome);
        });
        downstream
    }
}

/// The exclusive writer of one [`Future`].
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    /// Creates a promise paired with a fresh pending future.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Completes the underlying future with a value.
    ///
    /// A no-op if the future is already complete.
    pub fn success(&self, value: T) {
        self.complete(Ok(value));
    }

    /// Fails the underlying future.
    ///
    /// A no-op if the future is already complete.
    pub fn failure(&self, error: Error) {
        self.complete(Err(error));
    }

    /// Returns a handle onto the underlying future.
    #[must_use]
    pub fn future(&self) -> Future<T> {
        Future {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Installs an outcome; returns false if the future was already
    /// complete.
    pub(crate) fn complete(&self, outcome: Result<T>) -> bool {
        self.shared.complete(outcome)
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("complete", &self.shared.is_complete())
            .finish()
    }
}
