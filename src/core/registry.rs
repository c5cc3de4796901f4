//! Resource table: registry of descriptors with single-owner admission
//! control and coherent state reads.
//!
//! A table-wide `parking_lot::RwLock` guards the owner and state fields of
//! every descriptor. Read-only queries take the shared mode; owner and
//! state mutations take the exclusive mode. Adapter handles are cloned out
//! under the shared mode and invoked outside any lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::core::adapter::CameraAdapter;
use crate::core::error::ErrorCode;
use crate::core::transitions;
use crate::core::types::{CameraState, OperationType, OwnerToken, ResourceId};

/// Immediate-acquire exclusion primitive. `try_claim` never blocks.
#[derive(Debug, Default)]
pub struct ClaimFlag(AtomicBool);

impl ClaimFlag {
    /// Attempt to claim; returns false if already claimed.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release a previously successful claim.
    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Whether the flag is currently claimed.
    pub fn is_claimed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Per-resource record. Owner and state are guarded by the table lock; the
/// claim flag is tripped before the lock is taken on the acquire path.
struct DescriptorRecord {
    state: CameraState,
    owner: Option<OwnerToken>,
    adapter: Option<Arc<dyn CameraAdapter>>,
    claim: Arc<ClaimFlag>,
}

impl DescriptorRecord {
    fn new() -> Self {
        Self {
            state: CameraState::default(),
            owner: None,
            adapter: None,
            claim: Arc::new(ClaimFlag::default()),
        }
    }
}

/// Registry of resource descriptors keyed by [`ResourceId`].
///
/// Descriptors are created lazily on first reference and live until
/// shutdown. The only failure this component reports is `OWN2001` on
/// ownership contention.
pub struct ResourceTable {
    records: RwLock<HashMap<ResourceId, DescriptorRecord>>,
}

impl ResourceTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent insert-or-get of a descriptor at `Uninitialized` with no
    /// owner.
    pub fn ensure(&self, id: ResourceId) {
        let mut records = self.records.write();
        records.entry(id).or_insert_with(DescriptorRecord::new);
    }

    /// Attempt to become the single owner of `id`.
    ///
    /// Two-phase protocol: the claim flag is tripped first without any
    /// table lock, then the owner field is written under the exclusive
    /// mode. The second check closes the race in which the flag was won but
    /// another writer already recorded an owner.
    pub fn acquire(&self, id: ResourceId, token: &OwnerToken) -> Result<(), ErrorCode> {
        self.ensure(id);

        let claim = {
            let records = self.records.read();
            match records.get(&id) {
                Some(rec) => Arc::clone(&rec.claim),
                None => return Err(ErrorCode::OwnershipConflict),
            }
        };

        if !claim.try_claim() {
            return Err(ErrorCode::OwnershipConflict);
        }

        let mut records = self.records.write();
        match records.get_mut(&id) {
            Some(rec) if rec.owner.is_none() => {
                rec.owner = Some(token.clone());
                debug!(resource = %id, owner = %token, "resource acquired");
                Ok(())
            }
            Some(_) | None => {
                claim.release();
                Err(ErrorCode::OwnershipConflict)
            }
        }
    }

    /// Release ownership of `id` if `token` is the current owner.
    ///
    /// Returns false otherwise; non-owners cannot unlock.
    pub fn release(&self, id: ResourceId, token: &OwnerToken) -> bool {
        let mut records = self.records.write();
        match records.get_mut(&id) {
            Some(rec) if rec.owner.as_ref() == Some(token) => {
                rec.owner = None;
                rec.claim.release();
                debug!(resource = %id, owner = %token, "resource released");
                true
            }
            _ => false,
        }
    }

    /// Unconditional state write. The state machine is the gatekeeper; this
    /// primitive is unchecked.
    pub fn set_state(&self, id: ResourceId, next: CameraState) {
        let mut records = self.records.write();
        let rec = records.entry(id).or_insert_with(DescriptorRecord::new);
        rec.state = next;
    }

    /// Current state of `id`; `Uninitialized` for unknown ids.
    #[must_use]
    pub fn state(&self, id: ResourceId) -> CameraState {
        let records = self.records.read();
        records.get(&id).map_or(CameraState::default(), |r| r.state)
    }

    /// Current owner of `id`, if any.
    #[must_use]
    pub fn owner(&self, id: ResourceId) -> Option<OwnerToken> {
        let records = self.records.read();
        records.get(&id).and_then(|r| r.owner.clone())
    }

    /// Bind an adapter handle to `id`. Exactly-once in production;
    /// re-binding is permitted for tests.
    pub fn register_adapter(&self, id: ResourceId, adapter: Arc<dyn CameraAdapter>) {
        let mut records = self.records.write();
        let rec = records.entry(id).or_insert_with(DescriptorRecord::new);
        if rec.adapter.is_some() {
            warn!(resource = %id, "re-binding adapter");
        }
        rec.adapter = Some(adapter);
    }

    /// The adapter bound to `id`, if any.
    #[must_use]
    pub fn adapter(&self, id: ResourceId) -> Option<Arc<dyn CameraAdapter>> {
        let records = self.records.read();
        records.get(&id).and_then(|r| r.adapter.clone())
    }

    /// Validate ownership and the transition for `(id, token, op)`, and on
    /// success commit the next state. One critical section; no observer can
    /// witness an intermediate state.
    ///
    /// Returns the committed state, or the rejection code with state left
    /// unchanged.
    pub fn begin_operation(
        &self,
        id: ResourceId,
        token: &OwnerToken,
        op: OperationType,
    ) -> Result<CameraState, ErrorCode> {
        let mut records = self.records.write();
        let rec = records.entry(id).or_insert_with(DescriptorRecord::new);

        if op.requires_ownership() && rec.owner.as_ref() != Some(token) {
            return Err(ErrorCode::OwnershipConflict);
        }

        match transitions::next_state(rec.state, op) {
            Some(next) => {
                rec.state = next;
                Ok(next)
            }
            None => Err(ErrorCode::IllegalTransition),
        }
    }

    /// Clear every owner and claim. Called once at host shutdown.
    pub fn release_all(&self) {
        let mut records = self.records.write();
        for rec in records.values_mut() {
            rec.owner = None;
            rec.claim.release();
        }
    }
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}
