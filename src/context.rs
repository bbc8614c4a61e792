//! Cancellation context propagated into blocking waits.
//!
//! A [`Context`] is a cloneable handle onto shared cancellation state. It is
//! observed in four places: executor workers, barrier waits, wait group
//! waits, and deadline-bound future reads. Cancelling a context is
//! idempotent; the first recorded cause wins.
//!
//! Waiters that need to block on cancellation select over the channel
//! returned by [`Context::done`], which becomes ready (disconnected) once
//! the context is cancelled. Waiters that poll check
//! [`Context::is_cancelled`] or call [`Context::checkpoint`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::Error;

struct Inner {
    cancelled: AtomicBool,
    cause: Mutex<Option<Error>>,
    /// Dropped on cancellation, which disconnects `done_rx`.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

/// A cloneable cancellation handle.
///
/// All clones share the same state: cancelling one cancels them all.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Creates a fresh, uncancelled context.
    #[must_use]
    pub fn new() -> Self {
        let (done_tx, done_rx) = bounded::<()>(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                cause: Mutex::new(None),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }),
        }
    }

    /// Creates a context that nothing is expected to cancel.
    ///
    /// Used by the plain (non-context) variants of the blocking operations.
    #[must_use]
    pub fn background() -> Self {
        Self::new()
    }

    /// Cancels the context with the default cancellation cause.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn cancel(&self) {
        self.cancel_with(Error::cancelled());
    }

    /// Cancels the context, recording `cause` if none was recorded yet.
    pub fn cancel_with(&self, cause: Error) {
        if self.inner.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        {
            let mut slot = self.inner.cause.lock().expect("context cause poisoned");
            if slot.is_none() {
                *slot = Some(cause);
            }
        }
        // Dropping the sender disconnects every receiver cloned from done().
        self.inner
            .done_tx
            .lock()
            .expect("context channel poisoned")
            .take();
        tracing::trace!("context cancelled");
    }

    /// Returns true once the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Returns the recorded cancellation cause, if any.
    #[must_use]
    pub fn cause(&self) -> Option<Error> {
        self.inner
            .cause
            .lock()
            .expect("context cause poisoned")
            .clone()
    }

    /// A channel that disconnects once the context is cancelled.
    ///
    /// Intended for `crossbeam_channel::select!`: a `recv` arm on this
    /// receiver fires (with a disconnect error) exactly when the context is
    /// cancelled.
    #[must_use]
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done_rx
    }

    /// Returns `Ok(())` while live, or the cancellation cause once cancelled.
    pub fn checkpoint(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(self.cause().unwrap_or_else(|| Error::cancelled()))
        } else {
            Ok(())
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
