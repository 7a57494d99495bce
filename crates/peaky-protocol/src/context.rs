//! Cancellable, deadline-bound call contexts.
//!
//! A [`Context`] travels down the call chain (connection, render job, render
//! call). Children observe the cancellation of their ancestors and inherit
//! the earliest deadline along the chain. Long-running work polls
//! [`Context::err`] at convenient points; the party that owns a
//! [`CancelHandle`] stops that work by cancelling it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Reason a context is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context, or one of its ancestors, was cancelled.
    #[error("context cancelled")]
    Cancelled,
    /// The context's deadline has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Context>,
}

/// Cloneable handle describing a unit of cancellable work.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Root context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::build(None, None)
    }

    /// Child context with its own cancellation and the parent's deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        Self::build(self.deadline(), Some(self.clone()))
    }

    /// Child context bounded by `deadline` (or the parent's, if earlier).
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let effective = match self.deadline() {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self::build(Some(effective), Some(self.clone()))
    }

    /// Child context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    fn build(deadline: Option<Instant>, parent: Option<Self>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent,
            }),
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns a handle that cancels this context.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Returns why the context is finished, or `None` while it is live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Fails with the reason the context is finished.
    ///
    /// # Errors
    ///
    /// Returns the [`ContextError`] reported by [`Context::err`].
    pub fn check(&self) -> Result<(), ContextError> {
        self.err().map_or(Ok(()), Err)
    }

    /// Returns `true` once the context is cancelled or past its deadline.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Absolute deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline; zero once it has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(context) = current {
            if context.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            current = context.inner.parent.as_ref();
        }
        false
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

/// Cancellation function detached from the context it cancels.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<Inner>,
}

impl CancelHandle {
    /// Cancels the associated context.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }
}
