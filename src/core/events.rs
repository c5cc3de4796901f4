//! Completion event fan-out with handler-fault isolation.
//!
//! Dispatch is fire-and-forget: each handler is scheduled onto its own
//! runnable through the [`Spawn`] abstraction, so a slow or faulting
//! handler never blocks the scheduler's drain loop or its peers.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::error;

use crate::core::types::CompletionEvent;

/// Abstraction for scheduling a runnable onto a worker.
pub trait Spawn: Send + Sync {
    /// Schedule `fut` for execution. Must not block the caller.
    fn spawn(&self, fut: BoxFuture<'static, ()>);
}

/// Opaque handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&CompletionEvent) + Send + Sync>;

/// Fan-out of completion events to subscribers.
///
/// The hub never retains subscriber identity, only opaque callback
/// handles; sessions hold a [`SubscriptionId`] and unsubscribe on
/// disposal.
pub struct EventHub {
    subscribers: RwLock<HashMap<u64, Handler>>,
    next_id: AtomicU64,
    spawner: Arc<dyn Spawn>,
}

impl EventHub {
    /// A hub dispatching handlers through `spawner`.
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawn>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            spawner,
        }
    }

    /// Register a handler for every published completion event.
    pub fn subscribe(
        &self,
        handler: impl Fn(&CompletionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(id, Arc::new(handler));
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.write().remove(&id.0).is_some()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Schedule every subscriber for `event` and return immediately.
    ///
    /// Handler panics are contained and logged; a faulting handler does not
    /// prevent other handlers from running. No ordering is guaranteed among
    /// handlers for the same event.
    pub fn publish(&self, event: &CompletionEvent) {
        let handlers: Vec<Handler> = self.subscribers.read().values().cloned().collect();
        for handler in handlers {
            let event = event.clone();
            self.spawner.spawn(Box::pin(async move {
                if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                    error!(
                        operation_id = %event.operation_id,
                        resource = %event.resource_id,
                        "completion handler panicked"
                    );
                }
            }));
        }
    }
}
