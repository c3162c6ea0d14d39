//! Daemon mode: a long-lived loop turning host events into engine triggers.
//!
//! The daemon runs a select loop that:
//! 1. Dispatches trigger messages to the engine
//! 2. Reaps finished connect tasks
//! 3. Handles graceful shutdown
//!
//! Connect handling is spawned per message so one slow host never holds up
//! triggers for the others.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use vmsync_types::HostInfo;

use crate::engine::{AnomalyScanOutcome, ReconciliationEngine};
use crate::error::SyncError;

/// Trigger message for the daemon.
#[derive(Debug)]
pub enum TriggerMsg {
    /// A ping to `host` succeeded.
    PingTick { host: HostInfo },
    /// `host` is being connected; the reply decides whether the connect
    /// sequence may continue.
    HostConnected {
        host: HostInfo,
        resp: oneshot::Sender<Result<(), SyncError>>,
    },
    /// `host` came back after a transient disconnect.
    HostReestablished { host: HostInfo },
    /// `host` finished connecting; scan for VMs left in Unknown.
    AfterHostConnected {
        host: HostInfo,
        resp: Option<oneshot::Sender<Result<AnomalyScanOutcome, SyncError>>>,
    },
    /// Flip the ping-driven sync toggle.
    SetPingSync { enabled: bool },
}

pub struct SyncDaemon {
    engine: ReconciliationEngine,
    trigger_rx: mpsc::Receiver<TriggerMsg>,
    shutdown_rx: broadcast::Receiver<()>,
    tasks: JoinSet<()>,
}

impl SyncDaemon {
    pub fn new(
        engine: ReconciliationEngine,
        trigger_rx: mpsc::Receiver<TriggerMsg>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            engine,
            trigger_rx,
            shutdown_rx,
            tasks: JoinSet::new(),
        }
    }

    pub fn engine(&self) -> &ReconciliationEngine {
        &self.engine
    }

    /// Run until shutdown is signalled or every trigger sender is dropped.
    ///
    /// In-flight connect tasks are aborted on exit.
    pub async fn run(&mut self) {
        info!("vm sync daemon started");
        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("vm sync daemon shutting down");
                    break;
                }
                msg = self.trigger_rx.recv() => {
                    match msg {
                        Some(msg) => self.dispatch(msg),
                        None => {
                            debug!("trigger channel closed");
                            break;
                        }
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            warn!("trigger task panicked: {err}");
                        }
                    }
                }
            }
        }
        self.tasks.shutdown().await;
    }

    fn dispatch(&mut self, msg: TriggerMsg) {
        match msg {
            TriggerMsg::PingTick { host } => {
                // Fire-and-forget; the engine detaches its own task.
                let _ = self.engine.on_ping_tick(host);
            }
            TriggerMsg::HostReestablished { host } => {
                let _ = self.engine.on_host_reestablished(host);
            }
            TriggerMsg::HostConnected { host, resp } => {
                let engine = self.engine.clone();
                self.tasks.spawn(async move {
                    let result = engine.on_host_connected(&host).await;
                    let _ = resp.send(result);
                });
            }
            TriggerMsg::AfterHostConnected { host, resp } => {
                let engine = self.engine.clone();
                self.tasks.spawn(async move {
                    let result = engine.after_host_connected(&host).await;
                    if let Err(err) = &result {
                        warn!(host_id = %host.id, "anomaly scan failed: {err}");
                    }
                    if let Some(resp) = resp {
                        let _ = resp.send(result);
                    }
                });
            }
            TriggerMsg::SetPingSync { enabled } => {
                info!(enabled, "ping-driven vm sync toggled");
                self.engine.ping_toggle().set(enabled);
            }
        }
    }
}
