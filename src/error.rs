//! Error types shared across the crate.
//!
//! Error handling follows two rules:
//!
//! - Operational failures (a full queue, a shut-down executor, a broken
//!   barrier, an elapsed deadline) are returned as [`Error`] values.
//! - Caller misuse (out-of-range construction parameters, a negative wait
//!   group counter) is a logic bug and panics.
//!
//! [`Error`] is cheap to clone: future outcomes are cached once and handed
//! to every joiner, so the source chain is shared behind an `Arc`.

use core::fmt;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A submission was rejected because the executor queue is at capacity.
    QueueFull,
    /// A submission was rejected, or a pending job failed, because the
    /// executor was shut down.
    ShutDown,
    /// A barrier wait returned because the barrier was reset or its context
    /// was cancelled.
    BrokenBarrier,
    /// A deadline elapsed before the future completed.
    Timeout,
    /// The operation was cancelled through its context.
    Cancelled,
    /// A caller-supplied callable panicked; the payload was captured.
    Panicked,
    /// Any other, caller-supplied failure.
    Other,
}

impl ErrorKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::QueueFull => "executor queue is full",
            Self::ShutDown => "executor is shut down",
            Self::BrokenBarrier => "cyclic barrier is broken",
            Self::Timeout => "timed out",
            Self::Cancelled => "cancelled",
            Self::Panicked => "panicked",
            Self::Other => "error",
        }
    }
}

/// The error type returned by the primitives in this crate.
///
/// Carries a kind, optional deterministic context text, and an optional
/// shared source error.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
            source: None,
        }
    }

    /// A submission was rejected because the bounded queue is at capacity.
    #[must_use]
    pub const fn queue_full() -> Self {
        Self::new(ErrorKind::QueueFull)
    }

    /// A submission was rejected or a pending job was abandoned at shutdown.
    #[must_use]
    pub const fn shut_down() -> Self {
        Self::new(ErrorKind::ShutDown)
    }

    /// A barrier wait observed a reset or a cancelled cycle.
    #[must_use]
    pub const fn broken_barrier() -> Self {
        Self::new(ErrorKind::BrokenBarrier)
    }

    /// A deadline elapsed; the message records the duration that was waited.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::new(ErrorKind::Timeout).with_context(format!("{elapsed:?} elapsed"))
    }

    /// The operation was cancelled.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Wraps a panic payload caught from a caller-supplied callable.
    ///
    /// String payloads are preserved in the message; anything else is
    /// reported as an opaque panic.
    #[must_use]
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = payload.downcast_ref::<&str>().map_or_else(
            || {
                payload
                    .downcast_ref::<String>()
                    .map_or_else(|| "panic with non-string payload".to_owned(), Clone::clone)
            },
            |s| (*s).to_owned(),
        );
        Self::new(ErrorKind::Panicked).with_context(message)
    }

    /// Creates an error from arbitrary message text.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Other).with_context(message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if the submission queue was full.
    #[must_use]
    pub const fn is_queue_full(&self) -> bool {
        matches!(self.kind, ErrorKind::QueueFull)
    }

    /// Returns true if the executor was shut down.
    #[must_use]
    pub const fn is_shut_down(&self) -> bool {
        matches!(self.kind, ErrorKind::ShutDown)
    }

    /// Returns true if a barrier cycle was broken.
    #[must_use]
    pub const fn is_broken_barrier(&self) -> bool {
        matches!(self.kind, ErrorKind::BrokenBarrier)
    }

    /// Returns true if a deadline elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Returns true if the error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if a caller-supplied callable panicked.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self.kind, ErrorKind::Panicked)
    }

    /// Adds deterministic context text to the error.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(context) = &self.context {
            write!(f, ": {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
