//! Cancellation handles and the per-operation cancellation scope.
//!
//! A [`CancelToken`] is the caller-supplied handle accepted by every
//! operation entry. The scheduler composes up to three sources per
//! operation - its own shutdown token, the caller's handle, and a timeout -
//! into a [`CancellationScope`] whose outcome distinguishes a timeout from
//! any other cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

/// A clonable, thread-safe cancellation handle.
///
/// Cancellation is one-way and sticky: once cancelled, a token stays
/// cancelled. All clones observe the same state.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// A fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CancelInner {
                flag: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Trip the token, waking all waiters.
    pub fn cancel(&self) {
        if !self.inner.flag.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Whether the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolves when the token is tripped.
    ///
    /// The waiter is registered before the final flag check, so a `cancel`
    /// racing with this call is never missed.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Outcome of running a future under a [`CancellationScope`].
#[derive(Debug)]
pub enum ScopeOutcome<T> {
    /// The future ran to completion before any source tripped.
    Completed(T),
    /// The scheduler shut down or the caller cancelled.
    Cancelled,
    /// The per-operation timeout elapsed first.
    TimedOut,
}

/// Composition of shutdown, caller, and timeout cancellation sources under
/// which a single adapter call executes.
///
/// The scope owns a per-operation child token handed to the adapter; when
/// any source trips, the child token is cancelled so the adapter can observe
/// it.
pub struct CancellationScope {
    shutdown: CancelToken,
    caller: Option<CancelToken>,
    timeout: Option<Duration>,
    operation: CancelToken,
}

impl CancellationScope {
    /// Compose a scope from the scheduler shutdown token, an optional caller
    /// handle, and an optional timeout. A `None` timeout disables the
    /// timeout branch.
    #[must_use]
    pub fn new(
        shutdown: CancelToken,
        caller: Option<CancelToken>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            shutdown,
            caller,
            timeout,
            operation: CancelToken::new(),
        }
    }

    /// The child token the adapter call should honour.
    #[must_use]
    pub fn operation_token(&self) -> CancelToken {
        self.operation.clone()
    }

    /// Run `fut` under this scope.
    pub async fn run<T>(&self, fut: impl Future<Output = T>) -> ScopeOutcome<T> {
        if self.shutdown.is_cancelled()
            || self.caller.as_ref().is_some_and(CancelToken::is_cancelled)
        {
            self.operation.cancel();
            return ScopeOutcome::Cancelled;
        }

        let caller_tripped = async {
            match &self.caller {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::pin!(fut);
        tokio::select! {
            out = &mut fut => ScopeOutcome::Completed(out),
            () = self.shutdown.cancelled() => {
                self.operation.cancel();
                ScopeOutcome::Cancelled
            }
            () = caller_tripped => {
                self.operation.cancel();
                ScopeOutcome::Cancelled
            }
            () = tokio::time::sleep(self.timeout.unwrap_or(Duration::ZERO)),
                if self.timeout.is_some() =>
            {
                self.operation.cancel();
                ScopeOutcome::TimedOut
            }
        }
    }
}
