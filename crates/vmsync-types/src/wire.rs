//! JSON records exchanged with host agents.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{HostId, VmId};

pub use crate::SyncReport as VmSyncResponse;

/// Agent endpoint returning the state of every domain on the host.
pub const VM_SYNC_PATH: &str = "/vm/vmsync";
/// Agent endpoint checking a named set of domains.
pub const CHECK_VM_STATE_PATH: &str = "/vm/checkvmstate";
/// Agent liveness endpoint.
pub const PING_PATH: &str = "/host/ping";
/// Control-plane endpoint agents push state changes to.
pub const REPORT_VM_STATE_PATH: &str = "/kvm/reportvmstate";

/// Body of a sync call; the agent needs no parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSyncRequest {}

/// Unsolicited state change pushed by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportVmStateRequest {
    pub host_uuid: HostId,
    pub vm_uuid: VmId,
    pub vm_state: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckVmStateRequest {
    pub host_uuid: HostId,
    pub vm_uuids: Vec<VmId>,
}

/// Reply to a check; `states` carries canonical state names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckVmStateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub states: HashMap<VmId, String>,
}

// Failure replies may carry `"states": null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<VmId, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<VmId, String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_uuid: Option<HostId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_uuid: Option<HostId>,
}
