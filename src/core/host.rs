//! Host façade: pre-registers resources, hands out sessions, and owns
//! shutdown.
//!
//! The two-state lifecycle (initialized / not) is encoded as an option
//! field; use before `initialize` or after `shutdown` is a checked
//! precondition surfaced as `ARG3002`.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::HostOptions;
use crate::core::error::{BrokerError, BrokerResult};
use crate::core::events::EventHub;
use crate::core::registry::ResourceTable;
use crate::core::scheduler::OperationScheduler;
use crate::core::session::CameraSession;
use crate::core::types::{CameraState, OwnerToken, ResourceId};
use crate::infra::stub::StubCameraFactory;
use crate::runtime::TokioSpawner;
use crate::util::metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};
use crate::util::telemetry;

struct HostCore {
    table: Arc<ResourceTable>,
    scheduler: Arc<OperationScheduler>,
    hub: Arc<EventHub>,
    spawner: Arc<TokioSpawner>,
    camera_count: u32,
}

/// Entry point of the library.
///
/// One host owns one resource table, one scheduler, and one event hub;
/// sessions created from it share all three.
pub struct CameraHost {
    inner: RwLock<Option<Arc<HostCore>>>,
    metrics: RwLock<Option<Arc<InMemoryMetrics>>>,
}

impl CameraHost {
    /// An uninitialized host.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
            metrics: RwLock::new(None),
        }
    }

    /// Construct the broker: pre-register `options.camera_count` cameras,
    /// bind adapters from the factory, and start the scheduler.
    ///
    /// Idempotent; a second call on an initialized host is a no-op.
    pub fn initialize(&self, options: HostOptions) -> BrokerResult<()> {
        options
            .validate()
            .map_err(BrokerError::InvalidOptions)?;

        let mut inner = self.inner.write();
        if inner.is_some() {
            debug!("host already initialized");
            return Ok(());
        }

        telemetry::init_tracing(options.debug);

        let metrics: Arc<dyn MetricsSink> = if options.enable_metrics {
            let sink = Arc::new(InMemoryMetrics::new());
            *self.metrics.write() = Some(Arc::clone(&sink));
            sink
        } else {
            *self.metrics.write() = None;
            Arc::new(NoopMetrics)
        };

        let factory = options
            .adapter_factory
            .clone()
            .unwrap_or_else(|| Arc::new(StubCameraFactory::new()));

        let table = Arc::new(ResourceTable::new());
        for index in 0..options.camera_count {
            let id = ResourceId::camera(index);
            table.ensure(id);
            table.register_adapter(id, factory.create(id));
            // Pre-registered cameras come up ready; the transition table
            // has no path out of Uninitialized, so the unchecked state
            // primitive is the registration hook.
            table.set_state(id, CameraState::Ready);
        }

        let dispatch_threads = num_cpus::get().clamp(1, 4);
        let spawner = Arc::new(TokioSpawner::with_worker_threads(dispatch_threads)?);
        let hub = Arc::new(EventHub::new(
            Arc::clone(&spawner) as Arc<dyn crate::core::events::Spawn>
        ));

        let scheduler = OperationScheduler::start(
            Arc::clone(&table),
            Arc::clone(&hub),
            metrics,
            options.timeouts.clone(),
            options.default_configuration.clone(),
        );

        info!(cameras = options.camera_count, "camera host initialized");
        *inner = Some(Arc::new(HostCore {
            table,
            scheduler,
            hub,
            spawner,
            camera_count: options.camera_count,
        }));
        Ok(())
    }

    /// Create a session bound to the first free camera.
    ///
    /// With `user_id` absent a fresh token is generated. Fails with the
    /// `OWN2001`-coded [`BrokerError::NoFreeCamera`] when every camera has
    /// an owner, and with [`BrokerError::NotInitialized`] before
    /// initialization or after shutdown.
    pub fn create_session(&self, user_id: Option<&str>) -> BrokerResult<CameraSession> {
        let core = {
            let inner = self.inner.read();
            inner.as_ref().cloned().ok_or(BrokerError::NotInitialized)?
        };

        let token = user_id.map_or_else(OwnerToken::generate, OwnerToken::new);

        for index in 0..core.camera_count {
            let id = ResourceId::camera(index);
            if core.table.acquire(id, &token).is_ok() {
                info!(resource = %id, owner = %token, "session created");
                return Ok(CameraSession::new(
                    token,
                    id,
                    Arc::clone(&core.table),
                    Arc::clone(&core.scheduler),
                    Arc::clone(&core.hub),
                ));
            }
        }

        Err(BrokerError::NoFreeCamera)
    }

    /// Tear down the scheduler, release every owner, and stop dispatching
    /// events. Idempotent; a later `initialize` brings up a fresh broker.
    pub fn shutdown(&self) {
        let core = { self.inner.write().take() };
        let Some(core) = core else {
            return;
        };

        info!("camera host shutting down");
        core.scheduler.shutdown();
        core.table.release_all();
        core.spawner.shutdown();
    }

    /// Whether the host is currently initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Number of pre-registered cameras without an owner. Zero before
    /// initialization.
    #[must_use]
    pub fn free_resource_count(&self) -> u32 {
        let inner = self.inner.read();
        inner.as_ref().map_or(0, |core| {
            (0..core.camera_count)
                .filter(|&i| core.table.owner(ResourceId::camera(i)).is_none())
                .count() as u32
        })
    }

    /// The in-memory metrics sink installed at initialization, when
    /// metrics are enabled. Useful for inspection in tests.
    #[must_use]
    pub fn metrics(&self) -> Option<Arc<InMemoryMetrics>> {
        self.metrics.read().clone()
    }
}

impl Default for CameraHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CameraHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}
