use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::traits::AgentClient;
use crate::config::AgentClientConfig;
use crate::error::RemoteCallError;

/// Agent transport over HTTP: JSON POST to `<address><path>`.
pub struct HttpAgentClient {
    client: Client,
    config: AgentClientConfig,
}

impl HttpAgentClient {
    pub fn new(config: AgentClientConfig) -> Result<Self, RemoteCallError> {
        let client = Client::builder()
            .build()
            .map_err(|e| RemoteCallError::Transport {
                url: String::new(),
                reason: format!("build http client: {e}"),
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn call(
        &self,
        address: &str,
        path: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, RemoteCallError> {
        let url = format!("{}{}", address.trim_end_matches('/'), path);

        let response = match self
            .client
            .post(&url)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(RemoteCallError::Timeout { url, timeout }),
            Err(e) => {
                return Err(RemoteCallError::Transport {
                    url,
                    reason: format!("request failed: {e}"),
                });
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteCallError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) if e.is_timeout() => return Err(RemoteCallError::Timeout { url, timeout }),
            Err(e) => {
                return Err(RemoteCallError::Transport {
                    url,
                    reason: format!("read body failed: {e}"),
                });
            }
        };

        if body.len() > self.config.max_body_size {
            return Err(RemoteCallError::Decode {
                url,
                reason: format!(
                    "response body {} bytes exceeds limit {}",
                    body.len(),
                    self.config.max_body_size
                ),
            });
        }

        serde_json::from_slice(&body).map_err(|e| RemoteCallError::Decode {
            url,
            reason: e.to_string(),
        })
    }
}
