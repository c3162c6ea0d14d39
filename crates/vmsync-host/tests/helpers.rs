//! Shared fixtures for vmsync-host integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::{Context, SubscriberExt};
use vmsync_host::testing::{RecordingSink, ScriptedAgentClient, ScriptedVerifier};
use vmsync_host::{ReconciliationEngine, SyncConfig};
use vmsync_store::{MemVmStore, VmRecord};
use vmsync_types::{HostId, HostInfo, VmState};

pub const H1_URL: &str = "http://10.0.0.11:7070";
pub const H2_URL: &str = "http://10.0.0.12:7070";

pub fn h1() -> HostInfo {
    HostInfo::new("h1", "10.0.0.11")
}

pub fn h2() -> HostInfo {
    HostInfo::new("h2", "10.0.0.12")
}

pub fn vm(id: &str, state: VmState, host: &str) -> VmRecord {
    VmRecord::new(id, state, Some(HostId::new(host)))
}

pub struct Fixture {
    pub store: Arc<MemVmStore>,
    pub agent: Arc<ScriptedAgentClient>,
    pub sink: Arc<RecordingSink>,
    pub engine: ReconciliationEngine,
}

/// Engine over an in-memory store and a scripted agent, using the agent
/// itself for anomaly verification.
pub fn fixture(records: Vec<VmRecord>, config: SyncConfig) -> Fixture {
    let store = Arc::new(MemVmStore::with_records(records));
    let agent = Arc::new(ScriptedAgentClient::new());
    let sink = Arc::new(RecordingSink::new());
    let engine = ReconciliationEngine::builder(store.clone(), agent.clone(), sink.clone())
        .with_config(config)
        .build();
    Fixture {
        store,
        agent,
        sink,
        engine,
    }
}

/// Same as [`fixture`] but with a scripted verification collaborator.
pub fn fixture_with_verifier(
    records: Vec<VmRecord>,
    verifier: Arc<ScriptedVerifier>,
) -> Fixture {
    let store = Arc::new(MemVmStore::with_records(records));
    let agent = Arc::new(ScriptedAgentClient::new());
    let sink = Arc::new(RecordingSink::new());
    let engine = ReconciliationEngine::builder(store.clone(), agent.clone(), sink.clone())
        .with_verifier(verifier)
        .build();
    Fixture {
        store,
        agent,
        sink,
        engine,
    }
}

pub fn quick_timeouts() -> SyncConfig {
    SyncConfig {
        sync_timeout: Duration::from_millis(50),
        verify_timeout: Duration::from_millis(50),
        ping_timeout: Duration::from_millis(50),
        ..SyncConfig::default()
    }
}

/// Counts WARN events on the current thread.
#[derive(Clone, Default)]
pub struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == tracing::Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Install a warning counter as the thread's default subscriber.
///
/// Works with `#[tokio::test]`'s current-thread runtime, where spawned tasks
/// run on the test thread.
pub fn count_warnings() -> (WarnCounter, DefaultGuard) {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (counter, guard)
}
