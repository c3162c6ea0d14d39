//! Global CLI options and inventory resolution.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use vmsync_host::SyncConfig;
use vmsync_store::{Inventory, load_inventory};
use vmsync_types::{HostId, HostInfo};

/// Options shared by every command; most can be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Inventory file listing hosts and VMs (env: VMSYNC_INVENTORY)
    #[arg(short = 'i', long, global = true, env = "VMSYNC_INVENTORY")]
    pub inventory: Option<PathBuf>,

    /// Port host agents listen on (env: VMSYNC_AGENT_PORT)
    #[arg(long, global = true, env = "VMSYNC_AGENT_PORT")]
    pub agent_port: Option<u16>,

    /// Bound on each sync call in seconds (env: VMSYNC_SYNC_TIMEOUT_SECS)
    #[arg(long, global = true, env = "VMSYNC_SYNC_TIMEOUT_SECS")]
    pub sync_timeout_secs: Option<u64>,

    /// Print summaries as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress summaries
    #[arg(long, global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    pub fn load_inventory(&self) -> Result<Inventory> {
        let path = self
            .inventory
            .as_ref()
            .context("no inventory given; pass --inventory or set VMSYNC_INVENTORY")?;
        load_inventory(path).with_context(|| format!("load inventory {}", path.display()))
    }

    /// Environment defaults with command-line overrides applied.
    pub fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env();
        if let Some(port) = self.agent_port {
            config.agent.port = port;
        }
        if let Some(secs) = self.sync_timeout_secs {
            config.sync_timeout = Duration::from_secs(secs);
        }
        config
    }
}

pub fn resolve_host(inventory: &Inventory, id: &str) -> Result<HostInfo> {
    inventory
        .host(&HostId::new(id))
        .cloned()
        .with_context(|| format!("host '{id}' is not in the inventory"))
}
