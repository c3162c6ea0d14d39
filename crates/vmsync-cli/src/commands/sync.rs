//! `vmsync sync` command.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde_json::json;
use vmsync_host::{CompletionPolicy, SyncOutcome};

use crate::opts::{GlobalOpts, resolve_host};
use crate::output::{print_messages, print_summary};

use super::{build_engine, drain};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Host id from the inventory
    #[arg(long)]
    pub host: String,
}

pub async fn cmd_sync(opts: &GlobalOpts, args: &SyncArgs) -> Result<()> {
    let inventory = opts.load_inventory()?;
    let host = resolve_host(&inventory, &args.host)?;
    let config = opts.sync_config();
    let (engine, mut rx) = build_engine(Arc::new(inventory.to_store()), &config)?;

    let outcome = engine.sync_host(&host, CompletionPolicy::Propagate).await?;
    print_messages(&drain(&mut rx))?;

    if let SyncOutcome::Synced(summary) = outcome {
        print_summary(
            opts,
            json!({
                "host": host.id.as_str(),
                "reported": summary.reported,
                "untranslatable": summary.untranslatable,
                "filtered_out": summary.filtered_out,
                "orphaned": summary.orphaned,
                "emitted": summary.emitted,
            }),
        )?;
    }
    Ok(())
}
