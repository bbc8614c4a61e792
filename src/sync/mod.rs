//! Synchronization primitives.
//!
//! # Primitives
//!
//! - [`CyclicBarrier`]: reusable N-party rendezvous with break semantics
//! - [`WaitGroupContext`]: counting rendezvous with external cancellation
//! - [`OptimisticLock`]: reader-writer lock with a stamp-validated
//!   optimistic read path
//! - [`PriorityLock`]: mutex granting the lock by integer priority level
//! - [`ReentrantLock`]: owner-identity recursive mutex
//! - [`Once`]: idempotent, panic-tolerant single invocation
//! - [`Value`]: atomic holder of a heterogeneously-typed value
//!
//! All primitives are safe to share freely across threads behind an `Arc`;
//! none requires single-thread ownership. Lock acquisition hands out RAII
//! guards, so release-without-acquire misuse cannot be expressed.

mod barrier;
mod once;
mod optimistic;
mod priority;
mod reentrant;
mod value;
mod wait_group;

pub use barrier::CyclicBarrier;
pub use once::Once;
pub use optimistic::{OptimisticLock, OptimisticReadGuard, OptimisticWriteGuard};
pub use priority::{PriorityGuard, PriorityLock};
pub use reentrant::{ReentrantGuard, ReentrantLock};
pub use value::{Value, ValueHolder};
pub use wait_group::WaitGroupContext;
