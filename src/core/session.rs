//! Per-owner session bound to a single resource.
//!
//! The session pre-validates ownership and the transition synchronously,
//! publishes a correlation key before handing the request to intake, and
//! filters completion events back to typed callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::core::cancel::CancelToken;
use crate::core::error::ErrorCode;
use crate::core::events::{EventHub, SubscriptionId};
use crate::core::registry::ResourceTable;
use crate::core::scheduler::OperationScheduler;
use crate::core::transitions;
use crate::core::types::{
    CameraConfiguration, CameraState, CompletionEvent, OperationId, OperationTicket,
    OperationType, OwnerToken, ResourceId,
};

/// Completion notification tagged by the operation that finished.
///
/// Every variant carries the full [`CompletionEvent`] payload.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// `StartStreaming` finished.
    Started(CompletionEvent),
    /// `Stop` finished.
    Stopped(CompletionEvent),
    /// `Pause` finished.
    Paused(CompletionEvent),
    /// `Resume` finished.
    Resumed(CompletionEvent),
    /// `UpdateConfiguration` finished.
    Reconfigured(CompletionEvent),
    /// `Prepare` finished.
    Prepared(CompletionEvent),
    /// `Reset` finished.
    ResetCompleted(CompletionEvent),
}

impl SessionEvent {
    fn tag(operation: OperationType, event: CompletionEvent) -> Self {
        match operation {
            OperationType::StartStreaming => Self::Started(event),
            OperationType::Stop => Self::Stopped(event),
            OperationType::Pause => Self::Paused(event),
            OperationType::Resume => Self::Resumed(event),
            OperationType::UpdateConfiguration => Self::Reconfigured(event),
            OperationType::Prepare => Self::Prepared(event),
            OperationType::Reset => Self::ResetCompleted(event),
        }
    }

    /// The carried completion payload.
    #[must_use]
    pub const fn completion(&self) -> &CompletionEvent {
        match self {
            Self::Started(e)
            | Self::Stopped(e)
            | Self::Paused(e)
            | Self::Resumed(e)
            | Self::Reconfigured(e)
            | Self::Prepared(e)
            | Self::ResetCompleted(e) => e,
        }
    }
}

type TypedCallback = Arc<dyn Fn(&CompletionEvent) + Send + Sync>;
type EventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
struct SessionCallbacks {
    typed: RwLock<HashMap<OperationType, TypedCallback>>,
    catch_all: RwLock<Option<EventCallback>>,
}

impl SessionCallbacks {
    fn dispatch(&self, operation: OperationType, event: &CompletionEvent) {
        // Guards are released before the callbacks run so a handler may
        // re-register without deadlocking.
        let typed = self.typed.read().get(&operation).cloned();
        if let Some(callback) = typed {
            callback(event);
        }
        let catch_all = self.catch_all.read().clone();
        if let Some(callback) = catch_all {
            callback(&SessionEvent::tag(operation, event.clone()));
        }
    }
}

/// Owner-bound façade over one resource.
///
/// Sessions share one scheduler, one table, and one event hub per host.
/// Every operation entry returns its receipt immediately; outcomes arrive
/// through the registered callbacks.
pub struct CameraSession {
    token: OwnerToken,
    resource_id: ResourceId,
    table: Arc<ResourceTable>,
    scheduler: Arc<OperationScheduler>,
    hub: Arc<EventHub>,
    subscription: SubscriptionId,
    pending: Arc<Mutex<HashMap<OperationId, OperationType>>>,
    callbacks: Arc<SessionCallbacks>,
}

impl CameraSession {
    /// Bind `token` to `resource_id` and subscribe to the hub's completion
    /// stream.
    #[must_use]
    pub fn new(
        token: OwnerToken,
        resource_id: ResourceId,
        table: Arc<ResourceTable>,
        scheduler: Arc<OperationScheduler>,
        hub: Arc<EventHub>,
    ) -> Self {
        let pending: Arc<Mutex<HashMap<OperationId, OperationType>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let callbacks = Arc::new(SessionCallbacks::default());

        let filter_pending = Arc::clone(&pending);
        let filter_callbacks = Arc::clone(&callbacks);
        let subscription = hub.subscribe(move |event: &CompletionEvent| {
            if event.resource_id != resource_id {
                return;
            }
            let operation = filter_pending.lock().remove(&event.operation_id);
            if let Some(operation) = operation {
                filter_callbacks.dispatch(operation, event);
            }
        });

        Self {
            token,
            resource_id,
            table,
            scheduler,
            hub,
            subscription,
            pending,
            callbacks,
        }
    }

    /// The resource this session is bound to.
    #[must_use]
    pub const fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    /// The session's owner token.
    #[must_use]
    pub const fn token(&self) -> &OwnerToken {
        &self.token
    }

    /// Current resource state under the table's shared lock. Never blocks
    /// on adapter calls.
    #[must_use]
    pub fn current_state(&self) -> CameraState {
        self.table.state(self.resource_id)
    }

    /// Request streaming to start.
    pub fn start_streaming(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::StartStreaming, None, cancel)
    }

    /// Request streaming to stop.
    pub fn stop(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::Stop, None, cancel)
    }

    /// Request streaming to pause.
    pub fn pause(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::Pause, None, cancel)
    }

    /// Request paused streaming to resume.
    pub fn resume(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::Resume, None, cancel)
    }

    /// Request a configuration change. With `None` the scheduler's default
    /// configuration is applied.
    pub fn update_configuration(
        &self,
        config: Option<CameraConfiguration>,
        cancel: Option<CancelToken>,
    ) -> OperationTicket {
        self.submit(OperationType::UpdateConfiguration, config, cancel)
    }

    /// Request the resource be made ready. Ownership-exempt.
    pub fn prepare(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::Prepare, None, cancel)
    }

    /// Request recovery from the error state.
    pub fn reset(&self, cancel: Option<CancelToken>) -> OperationTicket {
        self.submit(OperationType::Reset, None, cancel)
    }

    /// Register the callback for completed `StartStreaming` operations.
    pub fn on_started(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::StartStreaming, f);
    }

    /// Register the callback for completed `Stop` operations.
    pub fn on_stopped(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::Stop, f);
    }

    /// Register the callback for completed `Pause` operations.
    pub fn on_paused(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::Pause, f);
    }

    /// Register the callback for completed `Resume` operations.
    pub fn on_resumed(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::Resume, f);
    }

    /// Register the callback for completed `UpdateConfiguration` operations.
    pub fn on_reconfigured(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::UpdateConfiguration, f);
    }

    /// Register the callback for completed `Prepare` operations.
    pub fn on_prepared(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::Prepare, f);
    }

    /// Register the callback for completed `Reset` operations.
    pub fn on_reset(&self, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.set_typed(OperationType::Reset, f);
    }

    /// Register a catch-all callback receiving every tagged completion for
    /// this session.
    pub fn on_event(&self, f: impl Fn(&SessionEvent) + Send + Sync + 'static) {
        *self.callbacks.catch_all.write() = Some(Arc::new(f));
    }

    fn set_typed(&self, op: OperationType, f: impl Fn(&CompletionEvent) + Send + Sync + 'static) {
        self.callbacks.typed.write().insert(op, Arc::new(f));
    }

    /// Shared entry: pre-check, publish the correlation key, hand off to
    /// intake.
    ///
    /// Pre-check rejections go through the scheduler's metered reject so
    /// immediate failures count toward `operation_failures_total` like
    /// asynchronous ones.
    fn submit(
        &self,
        operation: OperationType,
        config: Option<CameraConfiguration>,
        cancel: Option<CancelToken>,
    ) -> OperationTicket {
        let operation_id = self.scheduler.next_operation_id();

        if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return self
                .scheduler
                .reject(operation_id, operation, ErrorCode::Cancelled);
        }

        if let Some(cfg) = &config {
            if cfg.validate().is_err() {
                return self
                    .scheduler
                    .reject(operation_id, operation, ErrorCode::IllegalTransition);
            }
        }

        // Advisory ownership check; the worker re-checks under the table's
        // exclusive lock.
        if operation.requires_ownership()
            && self.table.owner(self.resource_id).as_ref() != Some(&self.token)
        {
            return self
                .scheduler
                .reject(operation_id, operation, ErrorCode::OwnershipConflict);
        }

        // Pure transition pre-check on the currently observed state.
        if !transitions::is_defined(self.table.state(self.resource_id), operation) {
            return self
                .scheduler
                .reject(operation_id, operation, ErrorCode::IllegalTransition);
        }

        // Publish the correlation key before intake so no completion can
        // outrun the pending entry.
        self.pending.lock().insert(operation_id, operation);

        let ticket = self.scheduler.enqueue_with_id(
            operation_id,
            self.resource_id,
            self.token.clone(),
            operation,
            config,
            cancel,
        );

        if !ticket.is_accepted() {
            self.pending.lock().remove(&operation_id);
        }
        ticket
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        // A disposed session stops receiving typed events; ownership is
        // released by the host at shutdown, not here.
        self.hub.unsubscribe(self.subscription);
        debug!(resource = %self.resource_id, owner = %self.token, "session disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeoutProfile;
    use crate::core::events::Spawn;
    use crate::util::metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};
    use futures::future::BoxFuture;
    use std::time::Duration;

    struct InlineSpawner;

    impl Spawn for InlineSpawner {
        fn spawn(&self, fut: BoxFuture<'static, ()>) {
            futures::executor::block_on(fut);
        }
    }

    fn session_fixture() -> (Arc<ResourceTable>, Arc<EventHub>, CameraSession) {
        let table = Arc::new(ResourceTable::new());
        let hub = Arc::new(EventHub::new(Arc::new(InlineSpawner)));
        let scheduler = OperationScheduler::start(
            Arc::clone(&table),
            Arc::clone(&hub),
            Arc::new(NoopMetrics) as Arc<dyn MetricsSink>,
            TimeoutProfile::default(),
            CameraConfiguration::default(),
        );
        let token = OwnerToken::new("u1");
        let id = ResourceId::camera(0);
        table.acquire(id, &token).unwrap();
        let session = CameraSession::new(token, id, Arc::clone(&table), scheduler, Arc::clone(&hub));
        (table, hub, session)
    }

    #[test]
    fn test_pre_cancelled_entry_rejects_synchronously() {
        let (_table, _hub, session) = session_fixture();
        let cancel = CancelToken::new();
        cancel.cancel();
        let ticket = session.start_streaming(Some(cancel));
        assert_eq!(ticket.error, Some(ErrorCode::Cancelled));
    }

    #[test]
    fn test_illegal_transition_rejects_synchronously() {
        let (_table, _hub, session) = session_fixture();
        // State is Uninitialized; StartStreaming is undefined.
        let ticket = session.start_streaming(None);
        assert_eq!(ticket.error, Some(ErrorCode::IllegalTransition));
    }

    #[test]
    fn test_non_owner_rejects_synchronously() {
        let (table, hub, session) = session_fixture();
        let scheduler = OperationScheduler::start(
            Arc::clone(&table),
            Arc::clone(&hub),
            Arc::new(NoopMetrics) as Arc<dyn MetricsSink>,
            TimeoutProfile::default(),
            CameraConfiguration::default(),
        );
        table.set_state(session.resource_id(), CameraState::Ready);

        let other = CameraSession::new(
            OwnerToken::new("u2"),
            session.resource_id(),
            table,
            scheduler,
            hub,
        );
        let ticket = other.start_streaming(None);
        assert_eq!(ticket.error, Some(ErrorCode::OwnershipConflict));
    }

    #[test]
    fn test_invalid_configuration_rejects_synchronously() {
        let (table, _hub, session) = session_fixture();
        table.set_state(session.resource_id(), CameraState::Ready);
        let mut cfg = CameraConfiguration::default();
        cfg.frame_rate_fps = 0;
        let ticket = session.update_configuration(Some(cfg), None);
        assert_eq!(ticket.error, Some(ErrorCode::IllegalTransition));
    }

    #[test]
    fn test_typed_callback_receives_completion() {
        let (table, _hub, session) = session_fixture();
        table.set_state(session.resource_id(), CameraState::Ready);

        let (tx, rx) = crossbeam_channel::unbounded();
        session.on_started(move |ev| {
            let _ = tx.send(ev.clone());
        });

        let ticket = session.start_streaming(None);
        assert!(ticket.is_accepted());

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(event.operation_id, ticket.operation_id);
        assert!(event.success());
        assert_eq!(event.state_after, CameraState::Streaming);
    }

    #[test]
    fn test_catch_all_receives_tagged_event() {
        let (table, _hub, session) = session_fixture();
        table.set_state(session.resource_id(), CameraState::Stopped);

        let (tx, rx) = crossbeam_channel::unbounded();
        session.on_event(move |ev| {
            let _ = tx.send(ev.clone());
        });

        let ticket = session.prepare(None);
        assert!(ticket.is_accepted());

        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            SessionEvent::Prepared(ev) => assert!(ev.success()),
            other => panic!("unexpected tag: {other:?}"),
        }
    }

    #[test]
    fn test_pre_check_rejections_are_metered() {
        let table = Arc::new(ResourceTable::new());
        let hub = Arc::new(EventHub::new(Arc::new(InlineSpawner)));
        let metrics = Arc::new(InMemoryMetrics::new());
        let scheduler = OperationScheduler::start(
            Arc::clone(&table),
            Arc::clone(&hub),
            Arc::clone(&metrics) as Arc<dyn MetricsSink>,
            TimeoutProfile::default(),
            CameraConfiguration::default(),
        );
        let token = OwnerToken::new("u1");
        let id = ResourceId::camera(0);
        table.acquire(id, &token).unwrap();
        let session = CameraSession::new(token, id, table, Arc::clone(&scheduler), hub);

        // Undefined transition from Uninitialized.
        assert!(!session.start_streaming(None).is_accepted());
        assert_eq!(
            metrics.failures_total(OperationType::StartStreaming, ErrorCode::IllegalTransition),
            1
        );

        // Pre-cancelled handle.
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(!session.stop(Some(cancel)).is_accepted());
        assert_eq!(
            metrics.failures_total(OperationType::Stop, ErrorCode::Cancelled),
            1
        );

        scheduler.shutdown();
    }

    #[test]
    fn test_disposed_session_stops_receiving() {
        let (_table, hub, session) = session_fixture();
        assert_eq!(hub.subscriber_count(), 1);
        drop(session);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
