//! Host-triggered VM state reconciliation.
//!
//! Every trigger funnels into [`ReconciliationEngine::sync_host`], which runs
//! one sync cycle and then resolves its result according to a
//! [`CompletionPolicy`]:
//!
//! | trigger                  | policy      | runs as          |
//! |--------------------------|-------------|------------------|
//! | host connected           | `Propagate` | awaited          |
//! | connection reestablished | `LogOnly`   | spawned task     |
//! | ping tick (if enabled)   | `Ignore`    | spawned task     |
//!
//! The after-connect anomaly scan is separate: it asks a [`StateVerifier`]
//! about VMs recorded as Unknown and never escalates a failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vmsync_store::DynVmStore;
use vmsync_types::{
    HostId, HostInfo, ReconciliationMessage, VmId, VmState, filter_for_sync, translate,
};

use crate::adapters::client::RemoteCallClient;
use crate::adapters::traits::AgentClient;
use crate::config::{PingSyncToggle, SyncConfig};
use crate::context::{AgentPortContexts, HostContext, HostContextProvider};
use crate::error::{RemoteCallError, SyncError};
use crate::push::{PushHandler, PushOutcome};
use crate::sink::MessageSink;
use crate::verifier::{AgentStateVerifier, StateVerifier};

/// What a trigger does with the result of its sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Drop the result.
    Ignore,
    /// Note a failure at debug level and carry on.
    LogOnly,
    /// Return the failure to the caller.
    Propagate,
}

/// Counts for one successful sync cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Entries in the host's report.
    pub reported: usize,
    /// Entries skipped because their token did not translate.
    pub untranslatable: usize,
    /// Entries dropped by the Running/Unknown filter.
    pub filtered_out: usize,
    /// Entries for VMs the store does not know.
    pub orphaned: usize,
    pub emitted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(SyncSummary),
    /// The cycle failed and the policy swallowed the error.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnomalyScanOutcome {
    /// No VM on the host is recorded as Unknown.
    NothingToVerify,
    Verified { checked: Vec<VmId>, emitted: usize },
    /// The verifier failed; the VMs stay Unknown until the next scan.
    VerificationFailed { checked: Vec<VmId> },
}

struct EngineInner {
    store: DynVmStore,
    client: RemoteCallClient,
    contexts: Arc<dyn HostContextProvider>,
    verifier: Arc<dyn StateVerifier>,
    sink: Arc<dyn MessageSink>,
    push: PushHandler,
    ping_toggle: PingSyncToggle,
    sync_timeout: Duration,
}

/// Reconciles host-reported VM state into the store's view.
///
/// Cheap to clone; clones share collaborators. Cycles for different hosts are
/// independent and may run concurrently.
#[derive(Clone)]
pub struct ReconciliationEngine {
    inner: Arc<EngineInner>,
}

pub struct EngineBuilder {
    store: DynVmStore,
    transport: Arc<dyn AgentClient>,
    sink: Arc<dyn MessageSink>,
    config: SyncConfig,
    contexts: Option<Arc<dyn HostContextProvider>>,
    verifier: Option<Arc<dyn StateVerifier>>,
    ping_toggle: Option<PingSyncToggle>,
}

impl EngineBuilder {
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_contexts(mut self, contexts: Arc<dyn HostContextProvider>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn StateVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Share an existing toggle instead of creating one from the config.
    pub fn with_ping_toggle(mut self, toggle: PingSyncToggle) -> Self {
        self.ping_toggle = Some(toggle);
        self
    }

    pub fn build(self) -> ReconciliationEngine {
        let client = RemoteCallClient::new(self.transport);
        let contexts = self
            .contexts
            .unwrap_or_else(|| Arc::new(AgentPortContexts::from(&self.config.agent)));
        let verifier = self.verifier.unwrap_or_else(|| {
            Arc::new(AgentStateVerifier::new(
                client.clone(),
                self.config.verify_timeout,
            ))
        });
        let ping_toggle = self
            .ping_toggle
            .unwrap_or_else(|| PingSyncToggle::new(self.config.sync_on_ping));
        let push = PushHandler::new(self.store.clone(), self.sink.clone());

        ReconciliationEngine {
            inner: Arc::new(EngineInner {
                store: self.store,
                client,
                contexts,
                verifier,
                sink: self.sink,
                push,
                ping_toggle,
                sync_timeout: self.config.sync_timeout,
            }),
        }
    }
}

impl ReconciliationEngine {
    pub fn builder(
        store: DynVmStore,
        transport: Arc<dyn AgentClient>,
        sink: Arc<dyn MessageSink>,
    ) -> EngineBuilder {
        EngineBuilder {
            store,
            transport,
            sink,
            config: SyncConfig::default(),
            contexts: None,
            verifier: None,
            ping_toggle: None,
        }
    }

    pub fn ping_toggle(&self) -> &PingSyncToggle {
        &self.inner.ping_toggle
    }

    pub fn push_handler(&self) -> &PushHandler {
        &self.inner.push
    }

    pub fn client(&self) -> &RemoteCallClient {
        &self.inner.client
    }

    pub fn contexts(&self) -> &Arc<dyn HostContextProvider> {
        &self.inner.contexts
    }

    /// Run one sync cycle against `host` and settle it per `policy`.
    ///
    /// Only `CompletionPolicy::Propagate` can return `Err`.
    pub async fn sync_host(
        &self,
        host: &HostInfo,
        policy: CompletionPolicy,
    ) -> Result<SyncOutcome, SyncError> {
        match self.run_sync_cycle(host).await {
            Ok(summary) => {
                debug!(
                    host_id = %host.id,
                    reported = summary.reported,
                    emitted = summary.emitted,
                    skipped = summary.untranslatable + summary.orphaned,
                    "vm sync finished"
                );
                Ok(SyncOutcome::Synced(summary))
            }
            Err(err) => match policy {
                CompletionPolicy::Propagate => Err(err),
                CompletionPolicy::LogOnly => {
                    debug!(host_id = %host.id, "vm sync failure not escalated: {err}");
                    Ok(SyncOutcome::Failed)
                }
                CompletionPolicy::Ignore => Ok(SyncOutcome::Failed),
            },
        }
    }

    /// Sync as part of establishing a connection. A failure must abort the
    /// connect sequence, so it is returned.
    pub async fn on_host_connected(&self, host: &HostInfo) -> Result<(), SyncError> {
        self.sync_host(host, CompletionPolicy::Propagate)
            .await
            .map(|_| ())
    }

    /// Sync after a transient disconnect. Runs in the background; the
    /// connection already stands on its own, so failures are only logged.
    pub fn on_host_reestablished(&self, host: HostInfo) -> JoinHandle<()> {
        self.spawn_sync(host, CompletionPolicy::LogOnly)
    }

    /// Sync piggybacked on a successful ping, when the toggle allows it.
    ///
    /// Returns `None` without touching the host when ping sync is disabled.
    pub fn on_ping_tick(&self, host: HostInfo) -> Option<JoinHandle<()>> {
        if !self.inner.ping_toggle.is_enabled() {
            return None;
        }
        Some(self.spawn_sync(host, CompletionPolicy::Ignore))
    }

    /// Post-connect check of VMs the store records as Unknown on `host`.
    ///
    /// Only store failures are returned; a failed verification is logged and
    /// reported as [`AnomalyScanOutcome::VerificationFailed`].
    pub async fn after_host_connected(
        &self,
        host: &HostInfo,
    ) -> Result<AnomalyScanOutcome, SyncError> {
        let unknown = self
            .inner
            .store
            .find_vms_by_host_and_state(&host.id, VmState::Unknown)?;
        if unknown.is_empty() {
            return Ok(AnomalyScanOutcome::NothingToVerify);
        }

        let ctx = self.context(host)?;
        let verified = match self.inner.verifier.check_states(&ctx, &unknown).await {
            Ok(states) => states,
            Err(source) => {
                let err = SyncError::Verification {
                    host_id: host.id.clone(),
                    source,
                };
                warn!(vms = ?unknown, "{err}");
                return Ok(AnomalyScanOutcome::VerificationFailed { checked: unknown });
            }
        };

        let requested: HashSet<&VmId> = unknown.iter().collect();
        let mut observed = HashMap::with_capacity(verified.len());
        for (vm, state) in verified {
            if requested.contains(&vm) {
                observed.insert(vm, state);
            } else {
                warn!(
                    host_id = %host.id,
                    vm_id = %vm,
                    "verifier answered for a vm that was not asked about; ignoring"
                );
            }
        }

        let (messages, _orphaned) = self.expected_states(&host.id, observed)?;
        let emitted = self.emit_all(messages)?;
        info!(host_id = %host.id, checked = unknown.len(), emitted, "verified vms in Unknown state");
        Ok(AnomalyScanOutcome::Verified {
            checked: unknown,
            emitted,
        })
    }

    /// Pushed state change from a host agent.
    pub fn handle_push(
        &self,
        vm_id: &VmId,
        host_id: &HostId,
        raw_state: &str,
    ) -> Result<PushOutcome, SyncError> {
        self.inner.push.handle_push(vm_id, host_id, raw_state)
    }

    fn spawn_sync(&self, host: HostInfo, policy: CompletionPolicy) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            // Non-propagating policies never return Err.
            let _ = engine.sync_host(&host, policy).await;
        })
    }

    fn context(&self, host: &HostInfo) -> Result<HostContext, SyncError> {
        self.inner
            .contexts
            .context(host)
            .ok_or_else(|| SyncError::UnknownHost(host.id.clone()))
    }

    /// One cycle: call, translate per VM, filter, look up, emit.
    ///
    /// Every failure is logged here once, as a warning.
    async fn run_sync_cycle(&self, host: &HostInfo) -> Result<SyncSummary, SyncError> {
        let result = self.sync_cycle_inner(host).await;
        if let Err(err) = &result {
            warn!(host_id = %host.id, address = %host.address, "{err}");
        }
        result
    }

    async fn sync_cycle_inner(&self, host: &HostInfo) -> Result<SyncSummary, SyncError> {
        let ctx = self.context(host)?;
        let remote_failure = |source: RemoteCallError| SyncError::RemoteCall {
            host_id: host.id.clone(),
            address: host.address.clone(),
            source,
        };

        let report = self
            .inner
            .client
            .call_sync(&ctx, self.inner.sync_timeout)
            .await
            .map_err(remote_failure)?;
        if !report.success {
            return Err(remote_failure(RemoteCallError::Agent {
                url: ctx.build_url(vmsync_types::wire::VM_SYNC_PATH),
                reason: report.error.unwrap_or_else(|| "no error detail".into()),
            }));
        }

        let mut summary = SyncSummary {
            reported: report.states.len(),
            ..SyncSummary::default()
        };

        let mut translated = HashMap::with_capacity(report.states.len());
        for (vm, token) in report.states {
            match translate(&token) {
                Ok(state) => {
                    translated.insert(vm, state);
                }
                Err(err) => {
                    // One bad entry must not cost the rest of the host its sync.
                    warn!(host_id = %host.id, vm_id = %vm, "{err}; skipping vm");
                    summary.untranslatable += 1;
                }
            }
        }

        let before_filter = translated.len();
        let tracked = filter_for_sync(translated);
        summary.filtered_out = before_filter - tracked.len();

        let (messages, orphaned) = self.expected_states(&host.id, tracked)?;
        summary.orphaned = orphaned;
        summary.emitted = self.emit_all(messages)?;
        Ok(summary)
    }

    /// Pair each observation with the store's current state.
    ///
    /// VMs the store does not know are logged and left out. Nothing is emitted
    /// here, so a store failure part way through leaves no partial batch.
    fn expected_states(
        &self,
        host_id: &HostId,
        observed: HashMap<VmId, VmState>,
    ) -> Result<(Vec<ReconciliationMessage>, usize), SyncError> {
        let mut messages = Vec::with_capacity(observed.len());
        let mut orphaned = 0;
        for (vm, state) in observed {
            match self.inner.store.find_state(&vm)? {
                Some(recorded) => {
                    messages.push(ReconciliationMessage::new(
                        vm,
                        state,
                        host_id.clone(),
                        recorded,
                    ));
                }
                None => {
                    let orphan = SyncError::OrphanVm {
                        vm_id: vm,
                        host_id: host_id.clone(),
                    };
                    warn!(state = %state, "{orphan}");
                    orphaned += 1;
                }
            }
        }
        Ok((messages, orphaned))
    }

    /// Hand messages to the sink in order, stopping at the first failure.
    ///
    /// Messages handed over before the failure are not recalled; the error
    /// records how many went out.
    fn emit_all(&self, messages: Vec<ReconciliationMessage>) -> Result<usize, SyncError> {
        let total = messages.len();
        for (emitted, message) in messages.into_iter().enumerate() {
            if let Err(source) = self.inner.sink.emit(message) {
                return Err(SyncError::Emit {
                    emitted,
                    total,
                    source,
                });
            }
        }
        Ok(total)
    }
}
