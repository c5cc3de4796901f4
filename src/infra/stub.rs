//! Stub camera adapter for development and testing.
//!
//! Behaviour is scripted per operation: an optional delay and an optional
//! forced fault. The stub honours the cancellation handle during its
//! delay, which makes timeout and cancellation paths reproducible.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::core::adapter::{AdapterError, AdapterFactory, CameraAdapter};
use crate::core::cancel::CancelToken;
use crate::core::types::{CameraConfiguration, OperationType, ResourceId};

/// Scripted behaviour for one stub operation.
#[derive(Debug, Clone, Default)]
pub struct StubBehavior {
    /// Simulated device latency before completing.
    pub delay: Duration,
    /// When set, the operation fails with this fault message.
    pub fault: Option<String>,
}

impl StubBehavior {
    /// Behaviour completing immediately with success.
    #[must_use]
    pub fn instant() -> Self {
        Self::default()
    }

    /// Behaviour sleeping for `delay` before succeeding.
    #[must_use]
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay,
            fault: None,
        }
    }

    /// Behaviour failing with `message` after any configured delay.
    #[must_use]
    pub fn faulty(message: impl Into<String>) -> Self {
        Self {
            delay: Duration::ZERO,
            fault: Some(message.into()),
        }
    }
}

/// In-process camera adapter with scripted per-operation behaviour.
pub struct StubCamera {
    id: ResourceId,
    behaviors: RwLock<HashMap<OperationType, StubBehavior>>,
    invocations: Mutex<Vec<OperationType>>,
    last_config: Mutex<Option<CameraConfiguration>>,
}

impl StubCamera {
    /// A stub for `id` where every operation succeeds immediately.
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            behaviors: RwLock::new(HashMap::new()),
            invocations: Mutex::new(Vec::new()),
            last_config: Mutex::new(None),
        }
    }

    /// Script the behaviour of one operation.
    pub fn script(&self, op: OperationType, behavior: StubBehavior) {
        self.behaviors.write().insert(op, behavior);
    }

    /// Operations invoked so far, in call order.
    #[must_use]
    pub fn invocations(&self) -> Vec<OperationType> {
        self.invocations.lock().clone()
    }

    /// The configuration most recently applied through
    /// `update_configuration`.
    #[must_use]
    pub fn last_config(&self) -> Option<CameraConfiguration> {
        self.last_config.lock().clone()
    }

    async fn run(&self, op: OperationType, cancel: CancelToken) -> Result<(), AdapterError> {
        self.invocations.lock().push(op);
        let behavior = self.behaviors.read().get(&op).cloned().unwrap_or_default();

        if behavior.delay > Duration::ZERO {
            tokio::select! {
                () = tokio::time::sleep(behavior.delay) => {}
                () = cancel.cancelled() => {
                    debug!(resource = %self.id, operation = %op, "stub observed cancellation");
                    return Err(AdapterError::Cancelled);
                }
            }
        }

        match behavior.fault {
            Some(message) => Err(AdapterError::Fault(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CameraAdapter for StubCamera {
    async fn start(&self, cancel: CancelToken) -> Result<(), AdapterError> {
        self.run(OperationType::StartStreaming, cancel).await
    }

    async fn stop(&self, cancel: CancelToken) -> Result<(), AdapterError> {
        self.run(OperationType::Stop, cancel).await
    }

    async fn pause(&self, cancel: CancelToken) -> Result<(), AdapterError> {
        self.run(OperationType::Pause, cancel).await
    }

    async fn resume(&self, cancel: CancelToken) -> Result<(), AdapterError> {
        self.run(OperationType::Resume, cancel).await
    }

    async fn update_configuration(
        &self,
        config: CameraConfiguration,
        cancel: CancelToken,
    ) -> Result<(), AdapterError> {
        let result = self.run(OperationType::UpdateConfiguration, cancel).await;
        if result.is_ok() {
            *self.last_config.lock() = Some(config);
        }
        result
    }
}

/// Factory handing out stub adapters, one per resource.
///
/// Pre-registered instances take precedence, so tests can script and then
/// inspect the exact adapter a resource is bound to.
#[derive(Default)]
pub struct StubCameraFactory {
    prepared: RwLock<HashMap<ResourceId, Arc<StubCamera>>>,
}

impl StubCameraFactory {
    /// A factory producing plain instant-success stubs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-register the stub handed out for `id`.
    pub fn insert(&self, id: ResourceId, camera: Arc<StubCamera>) {
        self.prepared.write().insert(id, camera);
    }
}

impl AdapterFactory for StubCameraFactory {
    fn create(&self, id: ResourceId) -> Arc<dyn CameraAdapter> {
        if let Some(camera) = self.prepared.read().get(&id) {
            return Arc::clone(camera) as Arc<dyn CameraAdapter>;
        }
        Arc::new(StubCamera::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_behaviour_succeeds() {
        let stub = StubCamera::new(ResourceId::camera(0));
        assert!(stub.start(CancelToken::new()).await.is_ok());
        assert_eq!(stub.invocations(), vec![OperationType::StartStreaming]);
    }

    #[tokio::test]
    async fn test_scripted_fault() {
        let stub = StubCamera::new(ResourceId::camera(0));
        stub.script(
            OperationType::StartStreaming,
            StubBehavior::faulty("sensor offline"),
        );
        match stub.start(CancelToken::new()).await {
            Err(AdapterError::Fault(msg)) => assert_eq!(msg, "sensor offline"),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delay_observes_cancellation() {
        let stub = StubCamera::new(ResourceId::camera(0));
        stub.script(
            OperationType::Stop,
            StubBehavior::delayed(Duration::from_secs(10)),
        );
        let cancel = CancelToken::new();
        let trip = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trip.cancel();
        });
        let outcome = tokio::time::timeout(Duration::from_secs(2), stub.stop(cancel))
            .await
            .expect("stub should observe cancellation quickly");
        assert!(matches!(outcome, Err(AdapterError::Cancelled)));
    }

    #[tokio::test]
    async fn test_update_configuration_records_config() {
        let stub = StubCamera::new(ResourceId::camera(0));
        let config = CameraConfiguration::default();
        stub.update_configuration(config.clone(), CancelToken::new())
            .await
            .unwrap();
        assert_eq!(stub.last_config(), Some(config));
    }

    #[tokio::test]
    async fn test_factory_prefers_prepared_instances() {
        let factory = StubCameraFactory::new();
        let id = ResourceId::camera(1);
        let prepared = Arc::new(StubCamera::new(id));
        factory.insert(id, Arc::clone(&prepared));

        let adapter = factory.create(id);
        adapter.start(CancelToken::new()).await.unwrap();
        // Calls through the returned handle land on the prepared instance.
        assert_eq!(prepared.invocations(), vec![OperationType::StartStreaming]);
    }
}
