//! Shared utilities: clock, metrics sinks, telemetry.

pub mod clock;
pub mod metrics;
pub mod telemetry;

pub use clock::now_ms;
pub use metrics::{InMemoryMetrics, MetricsSink, NoopMetrics};
pub use telemetry::init_tracing;
