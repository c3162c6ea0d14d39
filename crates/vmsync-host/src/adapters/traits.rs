use std::time::Duration;

use async_trait::async_trait;

use crate::error::RemoteCallError;

/// Transport contract for host agents: one JSON request, one JSON reply.
///
/// Implementations must not retry. `timeout` is always supplied by the caller.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn call(
        &self,
        address: &str,
        path: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, RemoteCallError>;
}
