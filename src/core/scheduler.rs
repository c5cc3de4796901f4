//! Operation scheduler: synchronous acceptance, asynchronous execution.
//!
//! Intake is multi-producer and never blocks; requests land on an
//! unbounded channel drained in FIFO order by a single dedicated worker
//! thread running its own single-threaded tokio runtime. Adapter calls
//! execute under a composed cancellation scope; completions fan out
//! through the event hub.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::TimeoutProfile;
use crate::core::adapter::AdapterError;
use crate::core::cancel::{CancelToken, CancellationScope, ScopeOutcome};
use crate::core::error::ErrorCode;
use crate::core::events::EventHub;
use crate::core::registry::ResourceTable;
use crate::core::types::{
    CameraConfiguration, CompletionEvent, OperationId, OperationRequest, OperationTicket,
    OperationType, OwnerToken, ResourceId,
};
use crate::util::metrics::MetricsSink;

/// Shared state consumed by the worker.
struct WorkerContext {
    table: Arc<ResourceTable>,
    hub: Arc<EventHub>,
    metrics: Arc<dyn MetricsSink>,
    timeouts: TimeoutProfile,
    default_config: CameraConfiguration,
    shutdown_token: CancelToken,
    shutdown_flag: Arc<AtomicBool>,
}

/// Scheduler with a non-blocking intake and a single consumer thread.
pub struct OperationScheduler {
    intake: Mutex<Option<Sender<OperationRequest>>>,
    next_op_id: AtomicU64,
    shutdown_flag: Arc<AtomicBool>,
    shutdown_token: CancelToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<dyn MetricsSink>,
}

impl OperationScheduler {
    /// Start a scheduler draining onto `table` and publishing completions
    /// to `hub`. The worker thread is running when this returns.
    #[must_use]
    pub fn start(
        table: Arc<ResourceTable>,
        hub: Arc<EventHub>,
        metrics: Arc<dyn MetricsSink>,
        timeouts: TimeoutProfile,
        default_config: CameraConfiguration,
    ) -> Arc<Self> {
        let (tx, rx) = unbounded::<OperationRequest>();
        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_token = CancelToken::new();

        let ctx = WorkerContext {
            table,
            hub,
            metrics: Arc::clone(&metrics),
            timeouts,
            default_config,
            shutdown_token: shutdown_token.clone(),
            shutdown_flag: Arc::clone(&shutdown_flag),
        };
        let worker = spawn_worker(rx, ctx);

        Arc::new(Self {
            intake: Mutex::new(Some(tx)),
            next_op_id: AtomicU64::new(1),
            shutdown_flag,
            shutdown_token,
            worker: Mutex::new(Some(worker)),
            metrics,
        })
    }

    /// Allocate a fresh process-unique operation id.
    ///
    /// Sessions call this before intake so the correlation key is published
    /// ahead of any completion observation.
    pub fn next_operation_id(&self) -> OperationId {
        OperationId(self.next_op_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Intake with a freshly allocated operation id.
    pub fn enqueue(
        &self,
        resource_id: ResourceId,
        owner: OwnerToken,
        operation: OperationType,
        config_override: Option<CameraConfiguration>,
        cancel: Option<CancelToken>,
    ) -> OperationTicket {
        let id = self.next_operation_id();
        self.enqueue_with_id(id, resource_id, owner, operation, config_override, cancel)
    }

    /// Build a `FailedImmediately` receipt and meter the failure.
    ///
    /// Every immediate failure goes through here so
    /// `operation_failures_total` counts synchronous rejections the same
    /// as asynchronous ones; sessions use it for their pre-check
    /// rejections.
    pub fn reject(
        &self,
        operation_id: OperationId,
        operation: OperationType,
        code: ErrorCode,
    ) -> OperationTicket {
        self.metrics.incr_failures(operation, code);
        OperationTicket::rejected(operation_id, code)
    }

    /// Intake with a caller-generated operation id.
    ///
    /// Non-blocking: the only failures are a pre-cancelled handle and a
    /// closed queue after shutdown, both surfaced as `CT0001`.
    pub fn enqueue_with_id(
        &self,
        operation_id: OperationId,
        resource_id: ResourceId,
        owner: OwnerToken,
        operation: OperationType,
        config_override: Option<CameraConfiguration>,
        cancel: Option<CancelToken>,
    ) -> OperationTicket {
        if cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return self.reject(operation_id, operation, ErrorCode::Cancelled);
        }

        let request = OperationRequest {
            operation_id,
            resource_id,
            owner,
            operation,
            config_override,
            cancel,
        };

        let sent = {
            let intake = self.intake.lock();
            match intake.as_ref() {
                Some(tx) => tx.send(request).is_ok(),
                None => false,
            }
        };

        if !sent {
            warn!(operation_id = %operation_id, operation = %operation, "intake closed; rejecting request");
            return self.reject(operation_id, operation, ErrorCode::Cancelled);
        }

        info!(
            operation_id = %operation_id,
            resource = %resource_id,
            operation = %operation,
            "request accepted"
        );
        self.metrics.incr_operations(operation);
        OperationTicket::accepted(operation_id)
    }

    /// Shut down: signal cancellation, close the intake, and join the
    /// worker with a bounded wait. Idempotent.
    pub fn shutdown(&self) {
        if self.shutdown_flag.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down operation scheduler");
        self.shutdown_token.cancel();

        // Dropping the sender unblocks the worker's recv loop.
        {
            let mut intake = self.intake.lock();
            *intake = None;
        }

        if let Some(worker) = self.worker.lock().take() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => {
                    debug!("worker joined");
                    let _ = join_thread.join();
                }
                Ok(false) => {
                    warn!("worker panicked");
                    let _ = join_thread.join();
                }
                Err(_) => {
                    // The helper is still blocked on the hung worker;
                    // dropping its handle detaches both.
                    warn!("worker did not exit within timeout - detaching");
                    drop(join_thread);
                }
            }
        }
    }

    /// Whether shutdown has been signalled.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown_flag.load(Ordering::Acquire)
    }
}

impl Drop for OperationScheduler {
    fn drop(&mut self) {
        // Signal but do not join in Drop; explicit shutdown() is the
        // graceful path.
        if !self.shutdown_flag.swap(true, Ordering::AcqRel) {
            self.shutdown_token.cancel();
            let mut intake = self.intake.lock();
            *intake = None;
        }
    }
}

/// Spawn the single consumer thread.
fn spawn_worker(rx: Receiver<OperationRequest>, ctx: WorkerContext) -> JoinHandle<()> {
    thread::Builder::new()
        .name("camera-broker-worker".into())
        .spawn(move || {
            debug!("scheduler worker started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(error = %e, "failed to create worker runtime");
                    return;
                }
            };

            // Blocking recv; dropping the sender ends the loop.
            while let Ok(request) = rx.recv() {
                if ctx.shutdown_flag.load(Ordering::Acquire) {
                    debug!("worker observed shutdown, exiting");
                    break;
                }
                rt.block_on(process_request(&ctx, request));
            }

            debug!("scheduler worker exiting");
        })
        .expect("failed to spawn scheduler worker")
}

/// Execute one queued request end to end.
async fn process_request(ctx: &WorkerContext, request: OperationRequest) {
    let start = Instant::now();
    let op = request.operation;
    let id = request.resource_id;

    // Defence in depth: the session validated the override synchronously,
    // but direct intake callers may not have.
    if op == OperationType::UpdateConfiguration {
        if let Some(cfg) = &request.config_override {
            if let Err(reason) = cfg.validate() {
                error!(
                    operation_id = %request.operation_id,
                    resource = %id,
                    reason = %reason,
                    "invalid configuration at worker time"
                );
                ctx.metrics.incr_failures(op, ErrorCode::IllegalTransition);
                return;
            }
        }
    }

    // State-machine rejections at worker time are logged and metered but
    // emit no completion event; the session already rejected the obvious
    // cases synchronously.
    if let Err(code) = ctx.table.begin_operation(id, &request.owner, op) {
        error!(
            operation_id = %request.operation_id,
            resource = %id,
            operation = %op,
            code = %code,
            "request rejected at worker time"
        );
        ctx.metrics.incr_failures(op, code);
        return;
    }

    let scope = CancellationScope::new(
        ctx.shutdown_token.clone(),
        request.cancel.clone(),
        ctx.timeouts.timeout_for(op),
    );

    let applied_config = if op == OperationType::UpdateConfiguration {
        Some(
            request
                .config_override
                .clone()
                .unwrap_or_else(|| ctx.default_config.clone()),
        )
    } else {
        None
    };

    // A descriptor without an adapter takes the success path as a no-op;
    // so do the operations the adapter interface does not model.
    let outcome = match ctx.table.adapter(id) {
        None => ScopeOutcome::Completed(Ok(())),
        Some(adapter) => {
            let token = scope.operation_token();
            let config = applied_config.clone();
            scope
                .run(async move {
                    match op {
                        OperationType::StartStreaming => adapter.start(token).await,
                        OperationType::Stop => adapter.stop(token).await,
                        OperationType::Pause => adapter.pause(token).await,
                        OperationType::Resume => adapter.resume(token).await,
                        OperationType::UpdateConfiguration => {
                            let config = config.unwrap_or_default();
                            adapter.update_configuration(config, token).await
                        }
                        OperationType::Prepare | OperationType::Reset => Ok(()),
                    }
                })
                .await
        }
    };

    let state_after = ctx.table.state(id);

    match outcome {
        ScopeOutcome::Completed(Ok(())) => {
            let metadata = applied_config
                .as_ref()
                .and_then(|cfg| serde_json::to_value(cfg).ok());
            info!(
                operation_id = %request.operation_id,
                resource = %id,
                operation = %op,
                state = ?state_after,
                "operation completed"
            );
            ctx.hub.publish(&CompletionEvent::succeeded(
                id,
                request.operation_id,
                op,
                state_after,
                metadata,
            ));
            ctx.metrics.observe_latency(op, start.elapsed());
        }
        ScopeOutcome::Cancelled | ScopeOutcome::Completed(Err(AdapterError::Cancelled)) => {
            warn!(
                operation_id = %request.operation_id,
                resource = %id,
                operation = %op,
                "operation cancelled"
            );
            ctx.hub.publish(&CompletionEvent::failed(
                id,
                request.operation_id,
                op,
                state_after,
                ErrorCode::Cancelled,
            ));
            ctx.metrics.incr_failures(op, ErrorCode::Cancelled);
        }
        ScopeOutcome::TimedOut => {
            error!(
                operation_id = %request.operation_id,
                resource = %id,
                operation = %op,
                "operation timed out"
            );
            ctx.hub.publish(&CompletionEvent::failed(
                id,
                request.operation_id,
                op,
                state_after,
                ErrorCode::Timeout,
            ));
            ctx.metrics.incr_failures(op, ErrorCode::Timeout);
        }
        ScopeOutcome::Completed(Err(AdapterError::Fault(reason))) => {
            error!(
                operation_id = %request.operation_id,
                resource = %id,
                operation = %op,
                reason = %reason,
                "hardware fault"
            );
            ctx.hub.publish(&CompletionEvent::failed(
                id,
                request.operation_id,
                op,
                state_after,
                ErrorCode::HardwareFault,
            ));
            ctx.metrics.incr_failures(op, ErrorCode::HardwareFault);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::Spawn;
    use crate::core::types::CameraState;
    use crate::util::metrics::InMemoryMetrics;
    use futures::future::BoxFuture;

    struct InlineSpawner;

    impl Spawn for InlineSpawner {
        fn spawn(&self, fut: BoxFuture<'static, ()>) {
            futures::executor::block_on(fut);
        }
    }

    fn fixture() -> (
        Arc<ResourceTable>,
        Arc<EventHub>,
        Arc<InMemoryMetrics>,
        Arc<OperationScheduler>,
    ) {
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
        (table, hub, metrics, scheduler)
    }

    #[test]
    fn test_pre_cancelled_handle_fails_immediately() {
        let (_table, _hub, metrics, scheduler) = fixture();
        let cancel = CancelToken::new();
        cancel.cancel();

        let ticket = scheduler.enqueue(
            ResourceId::camera(0),
            OwnerToken::new("u1"),
            OperationType::StartStreaming,
            None,
            Some(cancel),
        );
        assert!(!ticket.is_accepted());
        assert_eq!(ticket.error, Some(ErrorCode::Cancelled));
        assert_eq!(
            metrics.failures_total(OperationType::StartStreaming, ErrorCode::Cancelled),
            1
        );
        scheduler.shutdown();
    }

    #[test]
    fn test_worker_rejection_emits_no_event() {
        let (table, hub, metrics, scheduler) = fixture();
        let id = ResourceId::camera(0);
        let owner = OwnerToken::new("u1");
        table.acquire(id, &owner).unwrap();
        // State is Uninitialized: StartStreaming is undefined.

        let (tx, rx) = crossbeam_channel::unbounded();
        hub.subscribe(move |ev: &CompletionEvent| {
            let _ = tx.send(ev.clone());
        });

        let ticket = scheduler.enqueue(id, owner, OperationType::StartStreaming, None, None);
        assert!(ticket.is_accepted());

        assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
        assert_eq!(
            metrics.failures_total(OperationType::StartStreaming, ErrorCode::IllegalTransition),
            1
        );
        assert_eq!(table.state(id), CameraState::Uninitialized);
        scheduler.shutdown();
    }

    #[test]
    fn test_missing_adapter_takes_success_path() {
        let (table, hub, metrics, scheduler) = fixture();
        let id = ResourceId::camera(0);
        let owner = OwnerToken::new("u1");
        table.acquire(id, &owner).unwrap();
        table.set_state(id, CameraState::Ready);

        let (tx, rx) = crossbeam_channel::unbounded();
        hub.subscribe(move |ev: &CompletionEvent| {
            let _ = tx.send(ev.clone());
        });

        let ticket = scheduler.enqueue(
            id,
            owner,
            OperationType::StartStreaming,
            None,
            None,
        );
        assert!(ticket.is_accepted());

        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(event.success());
        assert_eq!(event.operation_id, ticket.operation_id);
        assert_eq!(event.state_after, CameraState::Streaming);
        assert_eq!(
            metrics.latency_samples(OperationType::StartStreaming).len(),
            1
        );
        scheduler.shutdown();
    }

    #[test]
    fn test_enqueue_after_shutdown_is_rejected() {
        let (_table, _hub, _metrics, scheduler) = fixture();
        scheduler.shutdown();
        assert!(scheduler.is_shut_down());

        let ticket = scheduler.enqueue(
            ResourceId::camera(0),
            OwnerToken::new("u1"),
            OperationType::Prepare,
            None,
            None,
        );
        assert!(!ticket.is_accepted());
        assert_eq!(ticket.error, Some(ErrorCode::Cancelled));
    }

    #[test]
    fn test_operation_ids_are_unique() {
        let (_table, _hub, _metrics, scheduler) = fixture();
        let a = scheduler.next_operation_id();
        let b = scheduler.next_operation_id();
        assert_ne!(a, b);
        scheduler.shutdown();
    }
}
