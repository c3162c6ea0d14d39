//! Subcommand implementations.

pub mod scan;
pub mod serve;
pub mod sync;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use vmsync_host::adapters::http::HttpAgentClient;
use vmsync_host::sink::ChannelSink;
use vmsync_host::{ReconciliationEngine, SyncConfig};
use vmsync_store::DynVmStore;
use vmsync_types::ReconciliationMessage;

/// Engine talking HTTP to host agents and emitting into a channel.
fn build_engine(
    store: DynVmStore,
    config: &SyncConfig,
) -> Result<(
    ReconciliationEngine,
    mpsc::UnboundedReceiver<ReconciliationMessage>,
)> {
    let transport = HttpAgentClient::new(config.agent.clone())?;
    let (sink, rx) = ChannelSink::new();
    let engine = ReconciliationEngine::builder(store, Arc::new(transport), Arc::new(sink))
        .with_config(config.clone())
        .build();
    Ok((engine, rx))
}

/// Everything emitted so far, without waiting for more.
fn drain(rx: &mut mpsc::UnboundedReceiver<ReconciliationMessage>) -> Vec<ReconciliationMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
