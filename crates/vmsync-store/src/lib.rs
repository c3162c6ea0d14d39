//! System-of-record contract for VM runtime state plus an in-memory backend
//! and a JSON inventory loader.

mod inventory;
mod mem_store;

pub use inventory::{Inventory, load_inventory};
pub use mem_store::MemVmStore;

use serde::{Deserialize, Serialize};
use std::{io, path::PathBuf, sync::Arc};
use vmsync_types::{HostId, VmId, VmState};

pub type StoreResult<T> = Result<T, StoreError>;
pub type DynVmStore = Arc<dyn VmStore>;

/// Query/update contract the reconciliation engine uses against the store.
///
/// Implementations must give per-row atomicity; nothing here spans rows.
pub trait VmStore: Send + Sync {
    /// Recorded state of `vm`, or `None` when the store has no such VM.
    fn find_state(&self, vm: &VmId) -> StoreResult<Option<VmState>>;

    /// VMs currently bound to `host` whose recorded state is `state`.
    fn find_vms_by_host_and_state(&self, host: &HostId, state: VmState) -> StoreResult<Vec<VmId>>;

    /// Set `vm` to `new` only if its recorded state is still `expected`.
    ///
    /// Returns `false` when the VM is missing or its state moved on.
    fn compare_and_set_state(
        &self,
        vm: &VmId,
        expected: VmState,
        new: VmState,
    ) -> StoreResult<bool>;
}

/// A VM row as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmRecord {
    pub id: VmId,
    pub state: VmState,
    /// Host currently owning the VM, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<HostId>,
}

impl VmRecord {
    pub fn new(id: impl Into<VmId>, state: VmState, host_id: Option<HostId>) -> Self {
        Self {
            id: id.into(),
            state,
            host_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid inventory JSON at {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid inventory: {0}")]
    Inventory(String),
    #[error("store lock poisoned")]
    Poisoned,
}
