use std::time::Duration;

use thiserror::Error;
use vmsync_store::StoreError;
use vmsync_types::{HostId, UnrecognizedState, VmId};

/// Failure of a single round trip to a host agent.
#[derive(Debug, Clone, Error)]
pub enum RemoteCallError {
    #[error("call to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("call to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("call to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("invalid reply from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("agent at {url} reported failure: {reason}")]
    Agent { url: String, reason: String },
}

impl RemoteCallError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RemoteCallError::Timeout { .. })
    }
}

/// Failure of the anomaly-scan verification collaborator.
#[derive(Debug, Clone, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Remote(#[from] RemoteCallError),
    #[error("verification rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Error)]
#[error("message sink closed: {0}")]
pub struct SinkError(pub String);

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("unable to do vm sync on host[uuid:{host_id}, ip:{address}]: {source}")]
    RemoteCall {
        host_id: HostId,
        address: String,
        #[source]
        source: RemoteCallError,
    },
    #[error(transparent)]
    UnrecognizedState(#[from] UnrecognizedState),
    #[error("anonymous vm[uuid:{vm_id}] detected on host[uuid:{host_id}]")]
    OrphanVm { vm_id: VmId, host_id: HostId },
    #[error("unable to check states of vms on host[uuid:{host_id}]: {source}")]
    Verification {
        host_id: HostId,
        #[source]
        source: VerificationError,
    },
    #[error("no agent context for host[uuid:{0}]")]
    UnknownHost(HostId),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("message sink failed after {emitted} of {total} messages: {source}")]
    Emit {
        emitted: usize,
        total: usize,
        #[source]
        source: SinkError,
    },
}
