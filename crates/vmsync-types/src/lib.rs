//! Shared VM-state types: identifiers, canonical states, the host token
//! translator, sync reports, reconciliation messages and host-agent wire records.

mod ids;
mod message;
mod report;
mod state;
mod translate;
pub mod wire;

pub use ids::{HostId, HostInfo, VmId};
pub use message::ReconciliationMessage;
pub use report::{SyncReport, SyncReportError, SyncStates};
pub use state::{UnknownVmState, VmState};
pub use translate::{UnrecognizedState, filter_for_sync, is_sync_tracked, translate};
