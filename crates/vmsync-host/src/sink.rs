//! Where reconciliation messages go once emitted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use vmsync_store::{StoreResult, VmStore};
use vmsync_types::ReconciliationMessage;

use crate::error::SinkError;

/// Consumer side of the reconciliation path. Emission is fire-and-forget; the
/// engine keeps nothing once a message is handed over.
///
/// Each `emit` stands alone. When one fails mid-batch the engine stops, and
/// the messages already emitted stay with the consumer.
pub trait MessageSink: Send + Sync {
    fn emit(&self, message: ReconciliationMessage) -> Result<(), SinkError>;
}

/// Forwards messages over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ReconciliationMessage>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReconciliationMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn emit(&self, message: ReconciliationMessage) -> Result<(), SinkError> {
        self.tx
            .send(message)
            .map_err(|e| SinkError(format!("receiver dropped before vm[uuid:{}]", e.0.vm_id)))
    }
}

/// Applies messages to a store with compare-and-set on the expected state.
///
/// A message whose expected state no longer matches the record lost a race
/// with a newer observation and is dropped.
pub struct StoreWriteback<S: VmStore> {
    store: Arc<S>,
}

impl<S: VmStore> StoreWriteback<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns whether the record changed.
    pub fn apply(&self, message: &ReconciliationMessage) -> StoreResult<bool> {
        if !message.diverges() {
            debug!(vm_id = %message.vm_id, state = %message.observed_state, "vm state already consistent");
            return Ok(false);
        }
        let changed = self.store.compare_and_set_state(
            &message.vm_id,
            message.expected_state,
            message.observed_state,
        )?;
        if changed {
            info!(
                vm_id = %message.vm_id,
                host_id = %message.host_id,
                from = %message.expected_state,
                to = %message.observed_state,
                "vm state reconciled"
            );
        } else {
            debug!(
                vm_id = %message.vm_id,
                expected = %message.expected_state,
                "stale reconciliation message dropped"
            );
        }
        Ok(changed)
    }

    /// Drain a channel until every sender is gone.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<ReconciliationMessage>) {
        while let Some(message) = rx.recv().await {
            if let Err(err) = self.apply(&message) {
                tracing::error!(vm_id = %message.vm_id, "failed to apply reconciliation message: {err}");
            }
        }
    }
}

impl<S: VmStore> MessageSink for StoreWriteback<S> {
    fn emit(&self, message: ReconciliationMessage) -> Result<(), SinkError> {
        self.apply(&message)
            .map(|_| ())
            .map_err(|e| SinkError(e.to_string()))
    }
}
