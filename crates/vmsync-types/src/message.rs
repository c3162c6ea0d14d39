use serde::{Deserialize, Serialize};

use crate::{HostId, VmId, VmState};

/// One observed-vs-recorded state pair for a VM, handed to the consumer.
///
/// `expected_state` is what the store held when the observation was made. A
/// consumer should apply `observed_state` only while the record still matches
/// it, since a sync cycle and a push for the same VM may arrive in any order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationMessage {
    pub vm_id: VmId,
    pub observed_state: VmState,
    pub host_id: HostId,
    pub expected_state: VmState,
}

impl ReconciliationMessage {
    pub fn new(
        vm_id: VmId,
        observed_state: VmState,
        host_id: HostId,
        expected_state: VmState,
    ) -> Self {
        Self {
            vm_id,
            observed_state,
            host_id,
            expected_state,
        }
    }

    /// True when the host sees something other than what the store holds.
    pub fn diverges(&self) -> bool {
        self.observed_state != self.expected_state
    }
}
