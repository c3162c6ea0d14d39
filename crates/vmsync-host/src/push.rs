//! Unsolicited state-change notifications pushed by host agents.

use std::sync::Arc;

use tracing::warn;
use vmsync_store::DynVmStore;
use vmsync_types::{HostId, ReconciliationMessage, VmId, translate};

use crate::error::SyncError;
use crate::sink::MessageSink;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push became a reconciliation message.
    Forwarded(ReconciliationMessage),
    /// The store has no such VM; the push was logged and dropped.
    Orphaned,
}

/// Checks pushes against the store and forwards them to the sink.
#[derive(Clone)]
pub struct PushHandler {
    store: DynVmStore,
    sink: Arc<dyn MessageSink>,
}

impl PushHandler {
    pub fn new(store: DynVmStore, sink: Arc<dyn MessageSink>) -> Self {
        Self { store, sink }
    }

    /// Handle one push from `host_id` claiming `vm_id` is now `raw_state`.
    ///
    /// A VM missing from the store is not created here; the push is dropped
    /// with a warning and `Ok(PushOutcome::Orphaned)` is returned. An
    /// unrecognized token is returned as an error so the agent sees it.
    pub fn handle_push(
        &self,
        vm_id: &VmId,
        host_id: &HostId,
        raw_state: &str,
    ) -> Result<PushOutcome, SyncError> {
        let Some(recorded) = self.store.find_state(vm_id)? else {
            let orphan = SyncError::OrphanVm {
                vm_id: vm_id.clone(),
                host_id: host_id.clone(),
            };
            warn!(state = raw_state, "{orphan}; dropping state report");
            return Ok(PushOutcome::Orphaned);
        };

        let observed = translate(raw_state)?;
        let message =
            ReconciliationMessage::new(vm_id.clone(), observed, host_id.clone(), recorded);
        self.sink.emit(message.clone())?;
        Ok(PushOutcome::Forwarded(message))
    }
}
