pub mod adapters;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod http;
pub mod modes;
pub mod push;
pub mod sink;
pub mod tracker;
pub mod verifier;

pub mod testing;

pub use adapters::client::RemoteCallClient;
pub use adapters::traits::AgentClient;
pub use config::{PingSyncToggle, SyncConfig};
pub use engine::{
    AnomalyScanOutcome, CompletionPolicy, EngineBuilder, ReconciliationEngine, SyncOutcome,
    SyncSummary,
};
pub use error::{RemoteCallError, SinkError, SyncError, VerificationError};
pub use modes::daemon::{SyncDaemon, TriggerMsg};
pub use push::{PushHandler, PushOutcome};
pub use tracker::{HostStatus, HostTracker};
