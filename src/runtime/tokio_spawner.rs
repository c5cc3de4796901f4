//! Tokio-backed implementation of the [`Spawn`] abstraction.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::core::events::Spawn;

enum Backing {
    /// A runtime this spawner owns; shut down with the spawner.
    Owned(tokio::runtime::Runtime),
    /// A handle to a runtime owned by the embedder.
    #[allow(dead_code)]
    Borrowed(tokio::runtime::Handle),
}

/// Spawner that executes runnables on a tokio runtime.
///
/// Either owns a dedicated multi-threaded runtime (the default for an
/// embedded host) or borrows the embedder's runtime through a handle.
pub struct TokioSpawner {
    backing: Mutex<Option<Backing>>,
    handle: tokio::runtime::Handle,
    stopped: AtomicBool,
}

impl TokioSpawner {
    /// Spawner backed by an existing runtime handle.
    #[must_use]
    pub fn from_handle(handle: tokio::runtime::Handle) -> Self {
        Self {
            backing: Mutex::new(Some(Backing::Borrowed(handle.clone()))),
            handle,
            stopped: AtomicBool::new(false),
        }
    }

    /// Spawner owning a new multi-threaded runtime with `worker_threads`
    /// workers.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, std::io::Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("camera-broker-dispatch")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            backing: Mutex::new(Some(Backing::Owned(runtime))),
            handle,
            stopped: AtomicBool::new(false),
        })
    }

    /// Stop accepting runnables and, for an owned runtime, shut it down
    /// without blocking the caller. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(Backing::Owned(runtime)) = self.backing.lock().take() {
            // Non-blocking teardown; safe to call from async contexts.
            runtime.shutdown_background();
            debug!("dispatch runtime shut down");
        }
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxFuture<'static, ()>) {
        if self.stopped.load(Ordering::Acquire) {
            debug!("spawner stopped; dropping runnable");
            return;
        }
        self.handle.spawn(fut);
    }
}

impl Drop for TokioSpawner {
    fn drop(&mut self) {
        self.shutdown();
    }
}
