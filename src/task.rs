//! Deferred computations producing futures on invocation.

use std::sync::Arc;
use std::thread;

use crate::error::Result;
use crate::future::{Future, Promise};

/// An inert computation descriptor.
///
/// A task holds a callable and does nothing until [`Task::call`] is invoked.
/// Each call starts an independent background execution completing its own
/// future.
pub struct Task<T> {
    task_fn: Arc<dyn Fn() -> Result<T> + Send + Sync>,
}

impl<T: Clone + Send + 'static> Task<T> {
    /// Wraps a callable into a task.
    pub fn new<F>(task_fn: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        Self {
            task_fn: Arc::new(task_fn),
        }
    }

    /// Schedules the callable on a background thread and returns a future
    /// tied to its outcome.
    #[must_use]
    pub fn call(&self) -> Future<T> {
        let task_fn = Arc::clone(&self.task_fn);
        let promise = Promise::new();
        let future = promise.future();
        thread::spawn(move || {
            promise.complete(task_fn());
        });
        future
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            task_fn: Arc::clone(&self.task_fn),
        }
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").finish_non_exhaustive()
    }
}
