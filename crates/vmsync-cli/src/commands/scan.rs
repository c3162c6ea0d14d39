//! `vmsync scan` command.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use vmsync_host::AnomalyScanOutcome;

use crate::opts::{GlobalOpts, resolve_host};
use crate::output::{print_messages, print_summary};

use super::{build_engine, drain};

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Host id from the inventory
    #[arg(long)]
    pub host: String,

    /// Bound on the verification call in seconds
    #[arg(long, env = "VMSYNC_VERIFY_TIMEOUT_SECS")]
    pub verify_timeout_secs: Option<u64>,
}

pub async fn cmd_scan(opts: &GlobalOpts, args: &ScanArgs) -> Result<()> {
    let inventory = opts.load_inventory()?;
    let host = resolve_host(&inventory, &args.host)?;
    let mut config = opts.sync_config();
    if let Some(secs) = args.verify_timeout_secs {
        config.verify_timeout = std::time::Duration::from_secs(secs);
    }
    let (engine, mut rx) = build_engine(Arc::new(inventory.to_store()), &config)?;

    let outcome = engine.after_host_connected(&host).await?;
    print_messages(&drain(&mut rx))?;

    let summary = match outcome {
        AnomalyScanOutcome::NothingToVerify => json!({
            "host": host.id.as_str(),
            "result": "nothing to verify",
        }),
        AnomalyScanOutcome::Verified { checked, emitted } => json!({
            "host": host.id.as_str(),
            "result": "verified",
            "checked": checked.len(),
            "emitted": emitted,
        }),
        AnomalyScanOutcome::VerificationFailed { checked } => json!({
            "host": host.id.as_str(),
            "result": "verification failed",
            "checked": checked.len(),
        }),
    };
    print_summary(opts, summary)
}
