//! # Camera Broker
//!
//! An embeddable library that brokers exclusive ownership of camera-like
//! hardware resources and mediates their lifecycle operations.
//!
//! Callers obtain a [`CameraSession`] bound to a single resource, issue
//! synchronous operation requests that return an [`OperationTicket`]
//! immediately, and observe completion through typed events. The library
//! guarantees single ownership per resource, rejects illegal state
//! transitions, and preserves a deterministic mapping between requests and
//! completion notifications.
//!
//! ## Modules
//!
//! - [`core`] - resource table, state machine, scheduler, event hub, session
//! - [`config`] - host options and per-operation timeout profile
//! - [`infra`] - stub camera adapter for development and testing
//! - [`runtime`] - spawner abstraction over tokio runtimes
//! - [`util`] - clock, metrics sinks, telemetry helpers
//!
//! ## Example
//!
//! ```no_run
//! use camera_broker::{CameraHost, HostOptions};
//!
//! let host = CameraHost::new();
//! host.initialize(HostOptions::new().with_camera_count(1)).unwrap();
//!
//! let session = host.create_session(Some("operator-1")).unwrap();
//!
//! let (tx, rx) = crossbeam_channel::unbounded();
//! session.on_started(move |event| {
//!     let _ = tx.send(event.clone());
//! });
//!
//! let ticket = session.start_streaming(None);
//! assert!(ticket.is_accepted());
//!
//! let completion = rx.recv().unwrap();
//! assert!(completion.success());
//!
//! host.shutdown();
//! ```
//!
//! Every synchronous entry returns a receipt immediately; asynchronous
//! completion events are the only mechanism by which a caller learns the
//! outcome of an accepted request.

#![deny(warnings)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod core;
pub mod infra;
pub mod runtime;
pub mod util;

// Re-export the main types for convenience
pub use config::{HostOptions, TimeoutProfile};
pub use core::{
    AdapterError, AdapterFactory, BrokerError, BrokerResult, CameraAdapter, CameraConfiguration,
    CameraHost, CameraSession, CameraState, CancelToken, CompletionEvent, ErrorCode, EventHub,
    OperationId, OperationTicket, OperationType, OwnerToken, PixelFormat, Resolution, ResourceId,
    ResourceKind, ResourceTable, SessionEvent, TicketStatus,
};
