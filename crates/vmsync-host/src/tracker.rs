//! Host tracker: pings every managed host and turns ping outcomes into
//! daemon triggers.
//!
//! Per-host connection state:
//!
//! ```text
//! Disconnected --ping ok--> Connecting --connect sync ok--> Connected
//!      ^                        |                            |    ^
//!      +----connect sync fails--+               ping fails   v    | ping ok (reestablished)
//!                                                            Lost-+
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};
use vmsync_types::wire::{PING_PATH, PingRequest, PingResponse};
use vmsync_types::{HostId, HostInfo};

use crate::adapters::client::RemoteCallClient;
use crate::context::HostContextProvider;
use crate::error::RemoteCallError;
use crate::modes::daemon::TriggerMsg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Disconnected,
    Connecting,
    Connected,
    Lost,
}

type StatusMap = Arc<Mutex<HashMap<HostId, HostStatus>>>;

fn lock(map: &StatusMap) -> MutexGuard<'_, HashMap<HostId, HostStatus>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct HostTracker {
    hosts: Vec<HostInfo>,
    client: RemoteCallClient,
    contexts: Arc<dyn HostContextProvider>,
    trigger_tx: mpsc::Sender<TriggerMsg>,
    status: StatusMap,
    ping_timeout: Duration,
}

impl HostTracker {
    pub fn new(
        hosts: Vec<HostInfo>,
        client: RemoteCallClient,
        contexts: Arc<dyn HostContextProvider>,
        trigger_tx: mpsc::Sender<TriggerMsg>,
        ping_timeout: Duration,
    ) -> Self {
        let status = hosts
            .iter()
            .map(|h| (h.id.clone(), HostStatus::Disconnected))
            .collect();
        Self {
            hosts,
            client,
            contexts,
            trigger_tx,
            status: Arc::new(Mutex::new(status)),
            ping_timeout,
        }
    }

    pub fn status(&self, host: &HostId) -> Option<HostStatus> {
        lock(&self.status).get(host).copied()
    }

    /// Ping every host once, concurrently, and send the resulting triggers.
    pub async fn tick(&self) {
        let pings = self.hosts.iter().map(|host| self.ping(host));
        let results = join_all(pings).await;
        for (host, result) in self.hosts.iter().zip(results) {
            match result {
                Ok(()) => self.on_ping_ok(host).await,
                Err(err) => self.on_ping_failed(host, &err),
            }
        }
    }

    /// Tick every `interval` until shutdown.
    pub async fn run(self, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => self.tick().await,
            }
        }
        debug!("host tracker stopped");
    }

    async fn ping(&self, host: &HostInfo) -> Result<(), RemoteCallError> {
        let Some(ctx) = self.contexts.context(host) else {
            return Err(RemoteCallError::Transport {
                url: host.address.clone(),
                reason: "no agent context".into(),
            });
        };
        let request = PingRequest {
            host_uuid: Some(host.id.clone()),
        };
        let reply: PingResponse = self
            .client
            .call_json(&ctx, PING_PATH, &request, self.ping_timeout)
            .await?;
        if !reply.success {
            return Err(RemoteCallError::Agent {
                url: ctx.build_url(PING_PATH),
                reason: reply.error.unwrap_or_else(|| "ping rejected".into()),
            });
        }
        Ok(())
    }

    async fn on_ping_ok(&self, host: &HostInfo) {
        let previous = {
            let mut status = lock(&self.status);
            let entry = status.entry(host.id.clone()).or_insert(HostStatus::Disconnected);
            let previous = *entry;
            *entry = match previous {
                HostStatus::Disconnected => HostStatus::Connecting,
                HostStatus::Lost => HostStatus::Connected,
                other => other,
            };
            previous
        };

        match previous {
            HostStatus::Disconnected => self.spawn_connect(host.clone()),
            HostStatus::Connecting => {}
            HostStatus::Lost => {
                info!(host_id = %host.id, "connection to host reestablished");
                // The reestablish sync covers this ping; ping sync resumes
                // on the next tick.
                self.send(TriggerMsg::HostReestablished { host: host.clone() })
                    .await;
            }
            HostStatus::Connected => {
                self.send(TriggerMsg::PingTick { host: host.clone() }).await;
            }
        }
    }

    fn on_ping_failed(&self, host: &HostInfo, err: &RemoteCallError) {
        let mut status = lock(&self.status);
        if let Some(entry) = status.get_mut(&host.id) {
            if *entry == HostStatus::Connected {
                warn!(host_id = %host.id, address = %host.address, "lost connection to host: {err}");
                *entry = HostStatus::Lost;
                return;
            }
        }
        debug!(host_id = %host.id, "ping failed: {err}");
    }

    /// Connect sync, then the anomaly scan. Runs detached so a slow connect
    /// does not delay the next tick for other hosts.
    fn spawn_connect(&self, host: HostInfo) {
        let trigger_tx = self.trigger_tx.clone();
        let status = self.status.clone();
        tokio::spawn(async move {
            let (resp_tx, resp_rx) = oneshot::channel();
            let sent = trigger_tx
                .send(TriggerMsg::HostConnected {
                    host: host.clone(),
                    resp: resp_tx,
                })
                .await;
            let connected = match (sent, resp_rx.await) {
                (Ok(()), Ok(Ok(()))) => true,
                (Ok(()), Ok(Err(err))) => {
                    debug!(host_id = %host.id, "host connect aborted: {err}");
                    false
                }
                _ => false,
            };

            let next = if connected {
                HostStatus::Connected
            } else {
                HostStatus::Disconnected
            };
            lock(&status).insert(host.id.clone(), next);

            if connected {
                info!(host_id = %host.id, address = %host.address, "host connected");
                let _ = trigger_tx
                    .send(TriggerMsg::AfterHostConnected { host, resp: None })
                    .await;
            }
        });
    }

    async fn send(&self, msg: TriggerMsg) {
        if self.trigger_tx.send(msg).await.is_err() {
            debug!("trigger channel closed; dropping trigger");
        }
    }
}
