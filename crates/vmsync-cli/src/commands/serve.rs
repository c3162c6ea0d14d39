//! `vmsync serve` command.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio::sync::{broadcast, mpsc};
use vmsync_host::http::spawn_push_server;
use vmsync_host::sink::StoreWriteback;
use vmsync_host::{HostTracker, SyncDaemon};

use crate::opts::GlobalOpts;

use super::build_engine;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Push endpoint bind address (env: VMSYNC_PUSH_BIND)
    #[arg(long, env = "VMSYNC_PUSH_BIND")]
    pub bind: Option<SocketAddr>,

    /// Do not start the push endpoint
    #[arg(long)]
    pub no_push: bool,

    /// Also sync on every successful ping
    #[arg(long)]
    pub sync_on_ping: bool,

    /// Seconds between host pings (env: VMSYNC_PING_INTERVAL_SECS)
    #[arg(long, env = "VMSYNC_PING_INTERVAL_SECS")]
    pub ping_interval_secs: Option<u64>,
}

pub async fn cmd_serve(opts: &GlobalOpts, args: &ServeArgs) -> Result<()> {
    let inventory = opts.load_inventory()?;
    let mut config = opts.sync_config();
    if let Some(bind) = args.bind {
        config.push_server.bind = bind;
    }
    if args.no_push {
        config.push_server.enabled = false;
    }
    if args.sync_on_ping {
        config.sync_on_ping = true;
    }
    if let Some(secs) = args.ping_interval_secs {
        config.ping_interval = Duration::from_secs(secs.max(1));
    }

    let store = Arc::new(inventory.to_store());
    let (engine, rx) = build_engine(store.clone(), &config)?;
    let writeback = tokio::spawn(StoreWriteback::new(store).run(rx));

    let (trigger_tx, trigger_rx) = mpsc::channel(128);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // Handle Ctrl-C and SIGTERM for graceful shutdown
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        let mut term =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down...");
            }
            _ = async {
                if let Some(ref mut t) = term { t.recv().await; }
            } => {
                tracing::info!("SIGTERM received, shutting down...");
            }
        }
        let _ = shutdown_tx_clone.send(());
    });

    let push = spawn_push_server(
        config.push_server.clone(),
        engine.push_handler().clone(),
        shutdown_tx.clone(),
    );

    let tracker = HostTracker::new(
        inventory.hosts.clone(),
        engine.client().clone(),
        engine.contexts().clone(),
        trigger_tx,
        config.ping_timeout,
    );
    let tracker = tokio::spawn(tracker.run(config.ping_interval, shutdown_tx.subscribe()));

    tracing::info!(
        hosts = inventory.hosts.len(),
        vms = inventory.vms.len(),
        ping_sync = config.sync_on_ping,
        "serving"
    );
    let mut daemon = SyncDaemon::new(engine, trigger_rx, shutdown_rx);
    daemon.run().await;
    drop(daemon);

    let _ = tracker.await;
    if let Some(push) = push {
        let _ = push.await;
    }
    // Detached reestablish/ping syncs may still hold the sink; give the
    // writeback a bounded window to apply what is queued.
    if tokio::time::timeout(Duration::from_secs(5), writeback)
        .await
        .is_err()
    {
        tracing::warn!("reconciliation writeback still busy at exit");
    }
    Ok(())
}
