//! Combinators over collections of futures.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::future::{Future, Promise};

/// Reduces many futures into a single future over all their outcomes.
///
/// Element `i` of the resulting vector is input `i`'s value on success or
/// its error on failure. The returned future itself never fails; an empty
/// input completes immediately with an empty vector.
#[must_use]
pub fn seq<T>(futures: Vec<Future<T>>) -> Future<Vec<Result<T>>>
where
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let collected = promise.future();
    thread::spawn(move || {
        let outcomes: Vec<Result<T>> = futures.iter().map(Future::join).collect();
        promise.success(outcomes);
    });
    collected
}

/// Returns a future completing with the outcome of whichever input
/// completes first.
///
/// Ties are resolved arbitrarily; exactly one input wins. A future made
/// from no inputs never completes.
#[must_use]
pub fn first_completed_of<T>(futures: impl IntoIterator<Item = Future<T>>) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let promise = Arc::new(Promise::new());
    let winner = promise.future();
    for future in futures {
        let promise = Arc::clone(&promise);
        thread::spawn(move || {
            promise.complete(future.join());
        });
    }
    winner
}

/// Returns a future that fails with a timeout error once `duration` has
/// elapsed.
///
/// Useful as a deadline arm for [`first_completed_of`].
#[must_use]
pub fn timer<T>(duration: Duration) -> Future<T>
where
    T: Clone + Send + 'static,
{
    let promise = Promise::new();
    let future = promise.future();
    thread::spawn(move || {
        thread::sleep(duration);
        promise.failure(Error::timeout(duration));
    });
    future
}
