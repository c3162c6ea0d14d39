use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use vmsync_types::SyncReport;
use vmsync_types::wire::{VM_SYNC_PATH, VmSyncRequest};

use super::traits::AgentClient;
use crate::context::HostContext;
use crate::error::RemoteCallError;

/// Typed calls to host agents on top of an [`AgentClient`] transport.
///
/// Every call resolves exactly once: with the decoded reply, or with an error.
/// The caller's timeout is enforced here as a hard cap even if the transport
/// ignores it.
#[derive(Clone)]
pub struct RemoteCallClient {
    transport: Arc<dyn AgentClient>,
}

impl RemoteCallClient {
    pub fn new(transport: Arc<dyn AgentClient>) -> Self {
        Self { transport }
    }

    pub async fn call_json<Req, Resp>(
        &self,
        host: &HostContext,
        path: &str,
        request: &Req,
        limit: Duration,
    ) -> Result<Resp, RemoteCallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = host.build_url(path);
        let payload = serde_json::to_value(request).map_err(|e| RemoteCallError::Decode {
            url: url.clone(),
            reason: format!("encode request: {e}"),
        })?;

        let call = self.transport.call(&host.base_url, path, payload, limit);
        let reply = match timeout(limit, call).await {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(RemoteCallError::Timeout {
                    url,
                    timeout: limit,
                });
            }
        };

        serde_json::from_value(reply).map_err(|e| RemoteCallError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    /// Ask the agent for the state of every VM it hosts.
    pub async fn call_sync(
        &self,
        host: &HostContext,
        limit: Duration,
    ) -> Result<SyncReport, RemoteCallError> {
        self.call_json(host, VM_SYNC_PATH, &VmSyncRequest::default(), limit)
            .await
    }
}
