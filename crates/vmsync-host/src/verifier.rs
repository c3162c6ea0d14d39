//! Follow-up verification for VMs the store records as Unknown.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use vmsync_types::wire::{CHECK_VM_STATE_PATH, CheckVmStateRequest, CheckVmStateResponse};
use vmsync_types::{VmId, VmState, translate};

use crate::adapters::client::RemoteCallClient;
use crate::context::HostContext;
use crate::error::VerificationError;

/// Collaborator that reports the authoritative state of named VMs on a host.
#[async_trait]
pub trait StateVerifier: Send + Sync {
    async fn check_states(
        &self,
        host: &HostContext,
        vms: &[VmId],
    ) -> Result<HashMap<VmId, VmState>, VerificationError>;
}

/// Verifies by asking the host agent directly.
pub struct AgentStateVerifier {
    client: RemoteCallClient,
    timeout: Duration,
}

impl AgentStateVerifier {
    pub fn new(client: RemoteCallClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl StateVerifier for AgentStateVerifier {
    async fn check_states(
        &self,
        host: &HostContext,
        vms: &[VmId],
    ) -> Result<HashMap<VmId, VmState>, VerificationError> {
        let request = CheckVmStateRequest {
            host_uuid: host.host.id.clone(),
            vm_uuids: vms.to_vec(),
        };
        let reply: CheckVmStateResponse = self
            .client
            .call_json(host, CHECK_VM_STATE_PATH, &request, self.timeout)
            .await?;
        if !reply.success {
            return Err(VerificationError::Rejected(
                reply.error.unwrap_or_else(|| "no error detail".into()),
            ));
        }

        let mut states = HashMap::with_capacity(reply.states.len());
        for (vm, token) in reply.states {
            // Canonical names first; older agents answer with hypervisor tokens.
            match token.parse::<VmState>().or_else(|_| translate(&token)) {
                Ok(state) => {
                    states.insert(vm, state);
                }
                Err(err) => {
                    warn!(host_id = %host.host.id, vm_id = %vm, "{err}; skipping vm");
                }
            }
        }
        Ok(states)
    }
}
