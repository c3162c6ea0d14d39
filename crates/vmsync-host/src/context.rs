use std::net::{IpAddr, SocketAddr};

use vmsync_types::HostInfo;

use crate::config::AgentClientConfig;

/// Everything needed to reach one host's agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostContext {
    pub host: HostInfo,
    /// Agent base URL, e.g. `http://10.0.0.11:7070`.
    pub base_url: String,
}

impl HostContext {
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Resolves host inventory entries to agent contexts.
///
/// Injected into the engine; returns `None` for hosts it cannot reach.
pub trait HostContextProvider: Send + Sync {
    fn context(&self, host: &HostInfo) -> Option<HostContext>;
}

/// Every agent listens on the same scheme and port at the host's address.
#[derive(Debug, Clone)]
pub struct AgentPortContexts {
    scheme: String,
    port: u16,
}

impl AgentPortContexts {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            port,
        }
    }
}

impl From<&AgentClientConfig> for AgentPortContexts {
    fn from(config: &AgentClientConfig) -> Self {
        Self::new(config.scheme.clone(), config.port)
    }
}

impl HostContextProvider for AgentPortContexts {
    fn context(&self, host: &HostInfo) -> Option<HostContext> {
        if host.address.is_empty() {
            return None;
        }
        Some(HostContext {
            host: host.clone(),
            base_url: format!("{}://{}", self.scheme, authority(&host.address, self.port)),
        })
    }
}

/// `host:port`, with IPv6 literals bracketed.
fn authority(address: &str, port: u16) -> String {
    let bare = address.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{address}:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_agent_urls() {
        let contexts = AgentPortContexts::new("http", 7070);
        let ctx = contexts.context(&HostInfo::new("h1", "10.0.0.11")).unwrap();
        assert_eq!(ctx.base_url, "http://10.0.0.11:7070");
        assert_eq!(ctx.build_url("/vm/vmsync"), "http://10.0.0.11:7070/vm/vmsync");
    }

    #[test]
    fn brackets_ipv6_addresses() {
        let contexts = AgentPortContexts::new("http", 7070);
        let ctx = contexts.context(&HostInfo::new("h6", "fd00::1")).unwrap();
        assert_eq!(ctx.base_url, "http://[fd00::1]:7070");

        let ctx = contexts.context(&HostInfo::new("h6", "[fd00::2]")).unwrap();
        assert_eq!(ctx.base_url, "http://[fd00::2]:7070");
    }

    #[test]
    fn keeps_dns_names() {
        let contexts = AgentPortContexts::new("https", 7443);
        let ctx = contexts
            .context(&HostInfo::new("h1", "kvm-01.example.net"))
            .unwrap();
        assert_eq!(ctx.base_url, "https://kvm-01.example.net:7443");
    }

    #[test]
    fn host_without_address_has_no_context() {
        let contexts = AgentPortContexts::new("http", 7070);
        assert!(contexts.context(&HostInfo::new("h1", "")).is_none());
    }
}
