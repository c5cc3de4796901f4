//! Hardware adapter abstraction.
//!
//! One adapter instance drives one physical device. Every operation accepts
//! a cancellation handle the adapter is expected to honour; completion is
//! signalled by returning.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::cancel::CancelToken;
use crate::core::types::{CameraConfiguration, ResourceId};

/// Failures an adapter operation can signal.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The adapter observed the cancellation handle and stopped early.
    #[error("operation cancelled")]
    Cancelled,
    /// The device raised an unexpected fault.
    #[error("hardware fault: {0}")]
    Fault(String),
}

/// Asynchronous driver interface for a single camera device.
#[async_trait]
pub trait CameraAdapter: Send + Sync {
    /// Begin delivering frames.
    async fn start(&self, cancel: CancelToken) -> Result<(), AdapterError>;

    /// Stop delivering frames.
    async fn stop(&self, cancel: CancelToken) -> Result<(), AdapterError>;

    /// Suspend frame delivery.
    async fn pause(&self, cancel: CancelToken) -> Result<(), AdapterError>;

    /// Resume suspended frame delivery.
    async fn resume(&self, cancel: CancelToken) -> Result<(), AdapterError>;

    /// Apply a new capture configuration.
    async fn update_configuration(
        &self,
        config: CameraConfiguration,
        cancel: CancelToken,
    ) -> Result<(), AdapterError>;
}

/// Produces one adapter per resource at host initialization.
pub trait AdapterFactory: Send + Sync {
    /// Build the adapter bound to `id`.
    fn create(&self, id: ResourceId) -> Arc<dyn CameraAdapter>;
}
