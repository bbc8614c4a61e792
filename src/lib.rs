//! Parasync: a toolbox of composable concurrency primitives.
//!
//! # Overview
//!
//! Parasync provides building blocks for asynchronous computation and
//! multi-party coordination on top of plain threads: write-once
//! promise/future pairs with transformation combinators, a bounded-queue
//! executor, a reusable barrier, a cancellable wait group, priority-aware
//! and optimistic and reentrant locks, a single-invocation guard, an
//! atomic polymorphic cell, and concurrent associative containers.
//!
//! # Module Structure
//!
//! - [`future`]: single-assignment result cells ([`Future`], [`Promise`])
//! - [`task`]: deferred computations producing futures
//! - [`combinators`]: sequence-join, first-completed, deadline futures
//! - [`executor`]: bounded-queue worker pool
//! - [`context`]: the cancellation context observed by blocking waits
//! - [`sync`]: barriers, wait groups, locks, once, and the atomic value
//! - [`map`]: thread-safe map implementations behind one [`Map`] trait
//! - [`error`]: the crate's error type
//!
//! # Blocking model
//!
//! Every primitive here is thread-blocking by design; nothing requires an
//! async runtime. The executor owns the only long-lived threads; futures
//! and combinators spawn short-lived helper threads exactly where a
//! transformation has to wait on an upstream result.
//!
//! # Sharing
//!
//! Primitives encapsulate their state and are meant to be shared freely
//! across threads behind an `Arc`. None of them is tied to an owning
//! thread.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod combinators;
pub mod context;
pub mod error;
pub mod executor;
pub mod future;
pub mod map;
pub mod sync;
pub mod task;
#[doc(hidden)]
pub mod test_utils;

pub use combinators::{first_completed_of, seq, timer};
pub use context::Context;
pub use error::{Error, ErrorKind, Result};
pub use executor::{Executor, ExecutorConfig, ExecutorStatus};
pub use future::{Future, Promise};
pub use map::{ConcurrentMap, Map, ShardedMap, SynchronizedMap};
pub use sync::{
    CyclicBarrier, Once, OptimisticLock, PriorityLock, ReentrantLock, Value, ValueHolder,
    WaitGroupContext,
};
pub use task::Task;
