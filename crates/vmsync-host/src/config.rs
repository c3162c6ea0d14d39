use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Timeout for a host sync call. Loaded hosts can take minutes to enumerate
/// their domains; anything longer is treated as a failure.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Bound on each sync call.
    pub sync_timeout: Duration,
    /// Bound on each anomaly-scan verification call.
    pub verify_timeout: Duration,
    /// Initial value of the ping-driven sync toggle.
    pub sync_on_ping: bool,
    /// How often the tracker pings each host.
    pub ping_interval: Duration,
    /// Bound on each ping call.
    pub ping_timeout: Duration,
    /// Host agent client configuration.
    pub agent: AgentClientConfig,
    /// Push endpoint configuration.
    pub push_server: PushServerConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            verify_timeout: DEFAULT_SYNC_TIMEOUT,
            sync_on_ping: false,
            ping_interval: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(15),
            agent: AgentClientConfig::default(),
            push_server: PushServerConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with `VMSYNC_*` environment variables.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_parse::<u64>("VMSYNC_SYNC_TIMEOUT_SECS") {
            config.sync_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("VMSYNC_VERIFY_TIMEOUT_SECS") {
            config.verify_timeout = Duration::from_secs(secs);
        }
        if let Some(flag) = std::env::var("VMSYNC_SYNC_ON_PING")
            .ok()
            .and_then(|v| parse_flag(&v))
        {
            config.sync_on_ping = flag;
        }
        if let Some(secs) = env_parse::<u64>("VMSYNC_PING_INTERVAL_SECS") {
            config.ping_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(port) = env_parse::<u16>("VMSYNC_AGENT_PORT") {
            config.agent.port = port;
        }
        if let Some(bind) = env_parse::<SocketAddr>("VMSYNC_PUSH_BIND") {
            config.push_server.bind = bind;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Lenient boolean: `1/true/yes/on` and `0/false/no/off`, any case.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration for talking to host agents.
#[derive(Debug, Clone)]
pub struct AgentClientConfig {
    pub scheme: String,
    pub port: u16,
    /// Maximum reply body size in bytes.
    pub max_body_size: usize,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            scheme: "http".into(),
            port: 7070,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

#[derive(Debug, Clone)]
pub struct PushServerConfig {
    pub enabled: bool,
    pub bind: SocketAddr,
}

impl Default for PushServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Runtime switch for ping-driven sync, shared by everyone holding a clone.
#[derive(Debug, Clone, Default)]
pub struct PingSyncToggle(Arc<AtomicBool>);

impl PingSyncToggle {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }
}
