//! Metrics sink abstraction and in-memory implementation.
//!
//! Three instruments: an operations counter incremented on acceptance, a
//! failures counter tagged by operation and error code, and a latency
//! histogram observed on success. Sinks must be safe to call from
//! arbitrary workers.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::error::ErrorCode;
use crate::core::types::OperationType;

/// Metrics sink consumed by the scheduler and sessions.
pub trait MetricsSink: Send + Sync {
    /// `operations_total{type}` - incremented when a request is accepted.
    fn incr_operations(&self, op: OperationType);

    /// `operation_failures_total{type,error}` - incremented on any failure,
    /// immediate or asynchronous.
    fn incr_failures(&self, op: OperationType, code: ErrorCode);

    /// `operation_latency_ms{type}` - observed on success.
    fn observe_latency(&self, op: OperationType, elapsed: Duration);
}

/// Sink that drops every observation. Used when metrics are disabled.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn incr_operations(&self, _op: OperationType) {}

    fn incr_failures(&self, _op: OperationType, _code: ErrorCode) {}

    fn observe_latency(&self, _op: OperationType, _elapsed: Duration) {}
}

/// In-memory sink for tests and embedders without a metrics pipeline.
#[derive(Default)]
pub struct InMemoryMetrics {
    operations: Mutex<HashMap<OperationType, u64>>,
    failures: Mutex<HashMap<(OperationType, ErrorCode), u64>>,
    latencies: Mutex<HashMap<OperationType, Vec<u64>>>,
}

impl InMemoryMetrics {
    /// An empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted-request count for `op`.
    #[must_use]
    pub fn operations_total(&self, op: OperationType) -> u64 {
        self.operations.lock().get(&op).copied().unwrap_or(0)
    }

    /// Failure count for `(op, code)`.
    #[must_use]
    pub fn failures_total(&self, op: OperationType, code: ErrorCode) -> u64 {
        self.failures.lock().get(&(op, code)).copied().unwrap_or(0)
    }

    /// Latency samples recorded for `op`, in milliseconds.
    #[must_use]
    pub fn latency_samples(&self, op: OperationType) -> Vec<u64> {
        self.latencies.lock().get(&op).cloned().unwrap_or_default()
    }
}

impl MetricsSink for InMemoryMetrics {
    fn incr_operations(&self, op: OperationType) {
        *self.operations.lock().entry(op).or_insert(0) += 1;
    }

    fn incr_failures(&self, op: OperationType, code: ErrorCode) {
        *self.failures.lock().entry((op, code)).or_insert(0) += 1;
    }

    fn observe_latency(&self, op: OperationType, elapsed: Duration) {
        self.latencies
            .lock()
            .entry(op)
            .or_default()
            .push(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
    }
}
