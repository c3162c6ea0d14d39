//! Deterministic collaborators for exercising the engine without real hosts.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use vmsync_types::wire::VM_SYNC_PATH;
use vmsync_types::{ReconciliationMessage, SyncReport, VmId, VmState};

use crate::adapters::traits::AgentClient;
use crate::context::HostContext;
use crate::error::{RemoteCallError, SinkError, VerificationError};
use crate::sink::MessageSink;
use crate::verifier::StateVerifier;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Canned reply for one agent path.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Json(serde_json::Value),
    Fail(RemoteCallError),
    /// Never answers; the caller's timeout has to fire.
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub address: String,
    pub path: String,
    pub payload: serde_json::Value,
    pub timeout: Duration,
}

/// Agent transport answering from a script keyed by `(address, path)`.
///
/// A reply registered without an address applies to every host. Replies are
/// reused for every call until replaced.
#[derive(Default)]
pub struct ScriptedAgentClient {
    replies: Mutex<HashMap<(Option<String>, String), ScriptedReply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedAgentClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, reply: ScriptedReply) {
        lock(&self.replies).insert((None, path.to_string()), reply);
    }

    pub fn respond_for(&self, address: &str, path: &str, reply: ScriptedReply) {
        lock(&self.replies).insert((Some(address.to_string()), path.to_string()), reply);
    }

    /// Script the sync endpoint for every host.
    pub fn sync_report(&self, report: &SyncReport) {
        let value = serde_json::to_value(report).unwrap_or_default();
        self.respond(VM_SYNC_PATH, ScriptedReply::Json(value));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.path == path).count()
    }
}

#[async_trait]
impl AgentClient for ScriptedAgentClient {
    async fn call(
        &self,
        address: &str,
        path: &str,
        payload: serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, RemoteCallError> {
        lock(&self.calls).push(RecordedCall {
            address: address.to_string(),
            path: path.to_string(),
            payload,
            timeout,
        });

        let reply = {
            let replies = lock(&self.replies);
            replies
                .get(&(Some(address.to_string()), path.to_string()))
                .or_else(|| replies.get(&(None, path.to_string())))
                .cloned()
        };
        match reply {
            Some(ScriptedReply::Json(value)) => Ok(value),
            Some(ScriptedReply::Fail(err)) => Err(err),
            Some(ScriptedReply::Hang) => std::future::pending().await,
            None => Err(RemoteCallError::Transport {
                url: format!("{address}{path}"),
                reason: "no scripted reply".into(),
            }),
        }
    }
}

/// Sink that keeps every message for later inspection.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ReconciliationMessage>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<ReconciliationMessage> {
        lock(&self.messages).clone()
    }
}

impl MessageSink for RecordingSink {
    fn emit(&self, message: ReconciliationMessage) -> Result<(), SinkError> {
        lock(&self.messages).push(message);
        Ok(())
    }
}

/// Verifier returning a fixed answer and counting requests.
pub struct ScriptedVerifier {
    reply: Result<HashMap<VmId, VmState>, VerificationError>,
    requests: Mutex<Vec<Vec<VmId>>>,
}

impl ScriptedVerifier {
    pub fn answering(states: impl IntoIterator<Item = (VmId, VmState)>) -> Self {
        Self {
            reply: Ok(states.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(VerificationError::Rejected(reason.into())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// VM lists received, one entry per request.
    pub fn requests(&self) -> Vec<Vec<VmId>> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl StateVerifier for ScriptedVerifier {
    async fn check_states(
        &self,
        _host: &HostContext,
        vms: &[VmId],
    ) -> Result<HashMap<VmId, VmState>, VerificationError> {
        lock(&self.requests).push(vms.to_vec());
        self.reply.clone()
    }
}
