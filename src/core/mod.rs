//! Core broker components: value types, resource table, state machine,
//! scheduler, event hub, session, and host façade.

pub mod adapter;
pub mod cancel;
pub mod error;
pub mod events;
pub mod host;
pub mod registry;
pub mod scheduler;
pub mod session;
pub mod transitions;
pub mod types;

pub use adapter::{AdapterError, AdapterFactory, CameraAdapter};
pub use cancel::{CancelToken, CancellationScope, ScopeOutcome};
pub use error::{BrokerError, BrokerResult, ErrorCode};
pub use events::{EventHub, Spawn, SubscriptionId};
pub use host::CameraHost;
pub use registry::{ClaimFlag, ResourceTable};
pub use scheduler::OperationScheduler;
pub use session::{CameraSession, SessionEvent};
pub use types::{
    CameraConfiguration, CameraState, CompletionEvent, OperationId, OperationTicket,
    OperationType, OwnerToken, PixelFormat, Resolution, ResourceId, ResourceKind, TicketStatus,
};
