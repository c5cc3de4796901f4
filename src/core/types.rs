//! Value types shared by all components: resource ids, states, operations,
//! configurations, receipts, and completion events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::cancel::CancelToken;
use crate::core::error::ErrorCode;
use crate::util::clock::now_ms;

/// Kind tag for a brokered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A camera device.
    Camera,
}

/// Identifier of a brokered resource, stable for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Small per-kind index assigned at registration.
    pub index: u32,
    /// Kind tag.
    pub kind: ResourceKind,
}

impl ResourceId {
    /// Identifier for the camera with the given index.
    #[must_use]
    pub const fn camera(index: u32) -> Self {
        Self {
            index,
            kind: ResourceKind::Camera,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ResourceKind::Camera => write!(f, "camera-{}", self.index),
        }
    }
}

/// Lifecycle state of a camera resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    /// Never touched by any operation.
    #[default]
    Uninitialized,
    /// Adapter bring-up in progress.
    Initializing,
    /// Configured and ready to stream.
    Ready,
    /// Actively streaming frames.
    Streaming,
    /// Streaming suspended, resumable.
    Paused,
    /// Streaming ended; requires prepare before reuse.
    Stopped,
    /// Faulted; requires reset.
    Error,
}

/// Lifecycle operation requested against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Begin streaming.
    StartStreaming,
    /// End streaming.
    Stop,
    /// Suspend streaming.
    Pause,
    /// Resume suspended streaming.
    Resume,
    /// Apply a new configuration.
    UpdateConfiguration,
    /// Make a stopped or fresh resource ready.
    Prepare,
    /// Recover a faulted resource.
    Reset,
}

impl OperationType {
    /// Whether the caller must be the resource's current owner.
    ///
    /// Only `Prepare` is ownership-exempt.
    #[must_use]
    pub const fn requires_ownership(self) -> bool {
        !matches!(self, Self::Prepare)
    }

    /// Snake-case name used in logs and metric tags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartStreaming => "start_streaming",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::UpdateConfiguration => "update_configuration",
            Self::Prepare => "prepare",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque session identifier. Two tokens are equal iff their identifiers are
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Token with a caller-chosen identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Token with a freshly generated identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The identifier string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

/// Pixel layout of captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 24-bit packed RGB.
    Rgb24,
    /// Planar YUV 4:2:0.
    Yuv420,
}

/// Capture configuration applied by `UpdateConfiguration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfiguration {
    /// Frame dimensions.
    pub resolution: Resolution,
    /// Pixel layout.
    pub pixel_format: PixelFormat,
    /// Target frame rate in frames per second.
    pub frame_rate_fps: u32,
}

impl CameraConfiguration {
    /// Validate configuration values.
    ///
    /// Width, height, and frame rate must all be strictly positive.
    pub fn validate(&self) -> Result<(), String> {
        if self.resolution.width == 0 {
            return Err("resolution width must be greater than 0".into());
        }
        if self.resolution.height == 0 {
            return Err("resolution height must be greater than 0".into());
        }
        if self.frame_rate_fps == 0 {
            return Err("frame_rate_fps must be greater than 0".into());
        }
        Ok(())
    }
}

impl Default for CameraConfiguration {
    fn default() -> Self {
        Self {
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            pixel_format: PixelFormat::Rgb24,
            frame_rate_fps: 30,
        }
    }
}

/// Process-unique identifier of a single operation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Outcome recorded on a synchronously returned receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// The request entered the asynchronous path; exactly one completion
    /// event will follow unless the worker rejects it at begin time.
    Accepted,
    /// The asynchronous path was never entered; no completion event will be
    /// emitted for this request.
    FailedImmediately,
}

/// Receipt returned by every synchronous operation entry.
///
/// An `Accepted` ticket carries no error code; a `FailedImmediately` ticket
/// carries exactly one. The constructors keep that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationTicket {
    /// Operation id, unique within the process.
    pub operation_id: OperationId,
    /// Acceptance or immediate failure.
    pub status: TicketStatus,
    /// Error code, present iff the ticket failed immediately.
    pub error: Option<ErrorCode>,
    /// Creation timestamp, milliseconds since epoch.
    pub created_at_ms: u128,
}

impl OperationTicket {
    /// Receipt for a request admitted to the queue.
    #[must_use]
    pub fn accepted(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            status: TicketStatus::Accepted,
            error: None,
            created_at_ms: now_ms(),
        }
    }

    /// Receipt for a request rejected before the queue.
    #[must_use]
    pub fn rejected(operation_id: OperationId, error: ErrorCode) -> Self {
        Self {
            operation_id,
            status: TicketStatus::FailedImmediately,
            error: Some(error),
            created_at_ms: now_ms(),
        }
    }

    /// Whether the request entered the asynchronous path.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.status == TicketStatus::Accepted
    }
}

/// Asynchronous notification emitted when an accepted request has succeeded,
/// been cancelled, timed out, or faulted in the adapter.
///
/// `success()` holds iff no error code is present; the constructors keep
/// that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Target resource.
    pub resource_id: ResourceId,
    /// Correlates with the receipt returned at intake.
    pub operation_id: OperationId,
    /// The operation that completed.
    pub operation: OperationType,
    /// Resource state observed after the operation.
    pub state_after: CameraState,
    /// Optional structured payload, e.g. the applied configuration.
    pub metadata: Option<serde_json::Value>,
    /// Error code, absent iff the operation succeeded.
    pub error: Option<ErrorCode>,
    /// Emission timestamp, milliseconds since epoch.
    pub timestamp_ms: u128,
}

impl CompletionEvent {
    /// Event for a successfully completed operation.
    #[must_use]
    pub fn succeeded(
        resource_id: ResourceId,
        operation_id: OperationId,
        operation: OperationType,
        state_after: CameraState,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            resource_id,
            operation_id,
            operation,
            state_after,
            metadata,
            error: None,
            timestamp_ms: now_ms(),
        }
    }

    /// Event for a cancelled, timed-out, or faulted operation.
    #[must_use]
    pub fn failed(
        resource_id: ResourceId,
        operation_id: OperationId,
        operation: OperationType,
        state_after: CameraState,
        error: ErrorCode,
    ) -> Self {
        Self {
            resource_id,
            operation_id,
            operation,
            state_after,
            metadata: None,
            error: Some(error),
            timestamp_ms: now_ms(),
        }
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Queued work item handed from intake to the worker.
#[derive(Debug, Clone)]
pub(crate) struct OperationRequest {
    /// Operation id published to the caller at intake.
    pub operation_id: OperationId,
    /// Target resource.
    pub resource_id: ResourceId,
    /// Requesting owner.
    pub owner: OwnerToken,
    /// Requested operation.
    pub operation: OperationType,
    /// Per-request configuration override for `UpdateConfiguration`.
    pub config_override: Option<CameraConfiguration>,
    /// Caller-supplied cancellation handle.
    pub cancel: Option<CancelToken>,
}
