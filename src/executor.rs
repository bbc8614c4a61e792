//! Bounded-queue worker pool returning futures for submitted jobs.
//!
//! The executor owns the only long-lived threads in this crate: a fixed
//! worker pool, a coordinator that reaps the workers and drains the queue at
//! shutdown, and a monitor that folds external cancellation into the
//! executor's own lifecycle.
//!
//! # Lifecycle
//!
//! Status moves monotonically through `Running → Terminating → ShutDown`:
//!
//! 1. [`Executor::shutdown`] (or cancellation of the construction context)
//!    cancels the internal context.
//! 2. The monitor flips Running → Terminating; workers observe cancellation
//!    and exit their loops once their current job finishes.
//! 3. The coordinator joins all workers, blocks new submissions, fails every
//!    job still in the queue with a shut-down error, and publishes the
//!    ShutDown status.
//!
//! Every submission that returned a future is completed exactly once:
//! either by its callable or by the shutdown drain.
//!
//! # Queueing
//!
//! [`Executor::submit`] never blocks: if the bounded queue is at capacity
//! the submission is rejected with a queue-full error. A queue size of zero
//! makes the queue a pure rendezvous; submissions then only succeed while a
//! worker is parked waiting for work.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use parking_lot::RwLock;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::future::{Future, Promise};

const STATUS_RUNNING: u32 = 0;
const STATUS_TERMINATING: u32 = 1;
const STATUS_SHUT_DOWN: u32 = 2;

/// The lifecycle state of an [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorStatus {
    /// Accepting and executing jobs.
    Running,
    /// Shutdown has begun; no new jobs are accepted.
    Terminating,
    /// All workers exited and the queue was drained.
    ShutDown,
}

impl ExecutorStatus {
    fn from_u32(raw: u32) -> Self {
        match raw {
            STATUS_RUNNING => Self::Running,
            STATUS_TERMINATING => Self::Terminating,
            _ => Self::ShutDown,
        }
    }
}

/// Executor sizing.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Number of worker threads; at least 1.
    pub worker_pool_size: usize,
    /// Capacity of the bounded job queue; 0 means rendezvous-only.
    pub queue_size: usize,
}

impl ExecutorConfig {
    /// Creates a validated configuration.
    ///
    /// # Panics
    /// Panics if `worker_pool_size` is zero.
    #[must_use]
    pub fn new(worker_pool_size: usize, queue_size: usize) -> Self {
        assert!(
            worker_pool_size >= 1,
            "executor worker pool size must be at least 1"
        );
        Self {
            worker_pool_size,
            queue_size,
        }
    }
}

/// A job owned by the queue until a worker claims it.
struct Job<T> {
    promise: Promise<T>,
    task: Box<dyn FnOnce(&Context) -> Result<T> + Send>,
}

impl<T> Job<T> {
    /// Runs the callable, isolating panics onto the promise.
    fn run(self, ctx: &Context) {
        let Self { promise, task } = self;
        match catch_unwind(AssertUnwindSafe(|| task(ctx))) {
            Ok(outcome) => {
                promise.complete(outcome);
            }
            Err(payload) => {
                promise.failure(Error::panicked(payload.as_ref()));
            }
        }
    }
}

fn worker_loop<T>(jobs: &Receiver<Job<T>>, ctx: &Context, status: &AtomicU32) {
    while status.load(Ordering::Acquire) == STATUS_RUNNING {
        select! {
            recv(jobs) -> msg => match msg {
                Ok(job) => job.run(ctx),
                Err(_) => break,
            },
            recv(ctx.done()) -> _ => break,
        }
    }
}

/// A bounded-queue worker pool submitting jobs and returning futures.
pub struct Executor<T> {
    status: Arc<AtomicU32>,
    submission: Arc<RwLock<()>>,
    jobs: Sender<Job<T>>,
    internal: Context,
}

impl<T: Send + 'static> Executor<T> {
    /// Spawns the worker pool and its monitor.
    ///
    /// Cancelling `ctx` shuts the executor down, exactly as
    /// [`Executor::shutdown`] does.
    #[must_use]
    pub fn new(ctx: &Context, config: ExecutorConfig) -> Self {
        let internal = Context::new();
        let status = Arc::new(AtomicU32::new(STATUS_RUNNING));
        let submission = Arc::new(RwLock::new(()));
        let (jobs_tx, jobs_rx) = bounded(config.queue_size);

        {
            let parent = ctx.clone();
            let internal = internal.clone();
            let status = Arc::clone(&status);
            thread::Builder::new()
                .name("parasync-executor-monitor".to_string())
                .spawn(move || {
                    select! {
                        recv(parent.done()) -> _ => {},
                        recv(internal.done()) -> _ => {},
                    }
                    internal.cancel();
                    let _ = status.compare_exchange(
                        STATUS_RUNNING,
                        STATUS_TERMINATING,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    tracing::debug!("executor terminating");
                })
                .expect("failed to spawn executor monitor");
        }

        {
            let worker_ctx = internal.clone();
            let status = Arc::clone(&status);
            let submission = Arc::clone(&submission);
            let pool_size = config.worker_pool_size;
            thread::Builder::new()
                .name("parasync-executor-coordinator".to_string())
                .spawn(move || {
                    let mut workers = Vec::with_capacity(pool_size);
                    for index in 0..pool_size {
                        let jobs = jobs_rx.clone();
                        let ctx = worker_ctx.clone();
                        let status = Arc::clone(&status);
                        let handle = thread::Builder::new()
                            .name(format!("parasync-worker-{index}"))
                            .spawn(move || worker_loop(&jobs, &ctx, &status))
                            .expect("failed to spawn executor worker");
                        workers.push(handle);
                    }
                    for handle in workers {
                        let _ = handle.join();
                    }
                    status.store(STATUS_TERMINATING, Ordering::Release);

                    // Block submitters while the queue is drained.
                    let _write = submission.write();
                    while let Ok(job) = jobs_rx.try_recv() {
                        job.promise.failure(Error::shut_down());
                    }
                    status.store(STATUS_SHUT_DOWN, Ordering::Release);
                    tracing::debug!("executor shut down");
                })
                .expect("failed to spawn executor coordinator");
        }

        Self {
            status,
            submission,
            jobs: jobs_tx,
            internal,
        }
    }

    /// Submits a job for asynchronous execution.
    ///
    /// Returns the job's future on acceptance, a shut-down error once the
    /// executor stopped running, or a queue-full error when the bounded
    /// queue is at capacity. Never blocks.
    pub fn submit<F>(&self, f: F) -> Result<Future<T>>
    where
        F: FnOnce(&Context) -> Result<T> + Send + 'static,
    {
        let _read = self.submission.read();
        if self.status.load(Ordering::Acquire) != STATUS_RUNNING {
            return Err(Error::shut_down());
        }

        let promise = Promise::new();
        let future = promise.future();
        let job = Job {
            promise,
            task: Box::new(f),
        };
        match self.jobs.try_send(job) {
            Ok(()) => Ok(future),
            Err(TrySendError::Full(_)) => Err(Error::queue_full()),
            Err(TrySendError::Disconnected(_)) => Err(Error::shut_down()),
        }
    }
}

impl<T> Executor<T> {
    /// Returns the current lifecycle status.
    #[must_use]
    pub fn status(&self) -> ExecutorStatus {
        ExecutorStatus::from_u32(self.status.load(Ordering::Acquire))
    }

    /// Begins shutdown. Idempotent and non-blocking.
    pub fn shutdown(&self) {
        self.internal.cancel();
    }

    /// Waits until the shutdown sequence has fully completed.
    ///
    /// Returns true iff the ShutDown status was reached within `timeout`.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.status() != ExecutorStatus::ShutDown {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
        true
    }
}

impl<T> Drop for Executor<T> {
    fn drop(&mut self) {
        self.shutdown();
        let _ = self.await_termination(Duration::from_secs(5));
    }
}

impl<T> std::fmt::Debug for Executor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
