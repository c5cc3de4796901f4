//! Host options and the per-operation timeout profile.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::adapter::AdapterFactory;
use crate::core::types::{CameraConfiguration, OperationType};

fn default_start_ms() -> u64 {
    5_000
}

fn default_stop_ms() -> u64 {
    5_000
}

fn default_pause_ms() -> u64 {
    3_000
}

fn default_resume_ms() -> u64 {
    3_000
}

fn default_update_configuration_ms() -> u64 {
    4_000
}

fn default_reset_ms() -> u64 {
    10_000
}

fn default_fallback_ms() -> u64 {
    5_000
}

/// Per-operation timeouts in milliseconds. A value of 0 disables the
/// timeout for that operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutProfile {
    /// Timeout for `StartStreaming`.
    #[serde(default = "default_start_ms")]
    pub start_ms: u64,
    /// Timeout for `Stop`.
    #[serde(default = "default_stop_ms")]
    pub stop_ms: u64,
    /// Timeout for `Pause`.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// Timeout for `Resume`.
    #[serde(default = "default_resume_ms")]
    pub resume_ms: u64,
    /// Timeout for `UpdateConfiguration`.
    #[serde(default = "default_update_configuration_ms")]
    pub update_configuration_ms: u64,
    /// Timeout for `Reset`.
    #[serde(default = "default_reset_ms")]
    pub reset_ms: u64,
    /// Timeout for operations without a dedicated entry.
    #[serde(default = "default_fallback_ms")]
    pub fallback_ms: u64,
}

impl Default for TimeoutProfile {
    fn default() -> Self {
        Self {
            start_ms: default_start_ms(),
            stop_ms: default_stop_ms(),
            pause_ms: default_pause_ms(),
            resume_ms: default_resume_ms(),
            update_configuration_ms: default_update_configuration_ms(),
            reset_ms: default_reset_ms(),
            fallback_ms: default_fallback_ms(),
        }
    }
}

impl TimeoutProfile {
    /// The timeout applied to `op`, or `None` when disabled.
    #[must_use]
    pub fn timeout_for(&self, op: OperationType) -> Option<Duration> {
        let ms = match op {
            OperationType::StartStreaming => self.start_ms,
            OperationType::Stop => self.stop_ms,
            OperationType::Pause => self.pause_ms,
            OperationType::Resume => self.resume_ms,
            OperationType::UpdateConfiguration => self.update_configuration_ms,
            OperationType::Reset => self.reset_ms,
            OperationType::Prepare => self.fallback_ms,
        };
        (ms > 0).then(|| Duration::from_millis(ms))
    }
}

fn default_camera_count() -> u32 {
    1
}

fn default_enable_metrics() -> bool {
    true
}

/// Options consumed by `CameraHost::initialize`.
///
/// # Example
///
/// ```rust
/// use camera_broker::HostOptions;
///
/// let options = HostOptions::new()
///     .with_camera_count(2)
///     .with_debug(true);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct HostOptions {
    /// Number of cameras to pre-register at initialization.
    #[serde(default = "default_camera_count")]
    pub camera_count: u32,
    /// Configuration applied when an `UpdateConfiguration` request carries
    /// no override.
    #[serde(default)]
    pub default_configuration: CameraConfiguration,
    /// Per-operation timeouts.
    #[serde(default)]
    pub timeouts: TimeoutProfile,
    /// When false, metric recording is a no-op.
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
    /// Hint to the logger sink; lowers the default log filter to `debug`.
    #[serde(default)]
    pub debug: bool,
    /// Adapter factory override. When absent the stub factory is used.
    #[serde(skip)]
    pub adapter_factory: Option<Arc<dyn AdapterFactory>>,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            camera_count: default_camera_count(),
            default_configuration: CameraConfiguration::default(),
            timeouts: TimeoutProfile::default(),
            enable_metrics: default_enable_metrics(),
            debug: false,
            adapter_factory: None,
        }
    }
}

impl fmt::Debug for HostOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostOptions")
            .field("camera_count", &self.camera_count)
            .field("default_configuration", &self.default_configuration)
            .field("timeouts", &self.timeouts)
            .field("enable_metrics", &self.enable_metrics)
            .field("debug", &self.debug)
            .field(
                "adapter_factory",
                &self.adapter_factory.as_ref().map(|_| "<factory>"),
            )
            .finish()
    }
}

impl HostOptions {
    /// Options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of pre-registered cameras.
    #[must_use]
    pub fn with_camera_count(mut self, count: u32) -> Self {
        self.camera_count = count;
        self
    }

    /// Set the fallback configuration for `UpdateConfiguration`.
    #[must_use]
    pub fn with_default_configuration(mut self, config: CameraConfiguration) -> Self {
        self.default_configuration = config;
        self
    }

    /// Set the per-operation timeout profile.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutProfile) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Toggle metric recording.
    #[must_use]
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Toggle the debug hint.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Override the adapter factory.
    #[must_use]
    pub fn with_adapter_factory(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.adapter_factory = Some(factory);
        self
    }

    /// Validate option values.
    pub fn validate(&self) -> Result<(), String> {
        if self.camera_count == 0 {
            return Err("camera_count must be greater than 0".into());
        }
        self.default_configuration
            .validate()
            .map_err(|e| format!("default_configuration invalid: {e}"))?;
        Ok(())
    }

    /// Parse options from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let options: Self =
            serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        options.validate()?;
        Ok(options)
    }
}
