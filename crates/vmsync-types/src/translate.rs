//! Host token translation and the sync filter.
//!
//! Hosts report libvirt domain states. Only Running and Unknown are trusted
//! from a sync report; every other state is authoritative at the control plane
//! and is dropped before reconciliation.

use std::collections::HashMap;
use std::hash::Hash;

use thiserror::Error;

use crate::VmState;

/// Raw host token outside the known libvirt state set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized vm state token '{token}'")]
pub struct UnrecognizedState {
    pub token: String,
}

/// Map a host-reported state token to a canonical [`VmState`].
///
/// Matching ignores ASCII case (`Running` and `running` are the same token).
pub fn translate(raw: &str) -> Result<VmState, UnrecognizedState> {
    let state = match raw.to_ascii_lowercase().as_str() {
        "running" | "blocked" => VmState::Running,
        "paused" | "pmsuspended" => VmState::Paused,
        "shutdown" | "shutoff" => VmState::Stopped,
        "nostate" | "crashed" => VmState::Unknown,
        _ => {
            return Err(UnrecognizedState {
                token: raw.to_string(),
            });
        }
    };
    Ok(state)
}

/// True for the states a sync report is allowed to reconcile.
pub fn is_sync_tracked(state: VmState) -> bool {
    matches!(state, VmState::Running | VmState::Unknown)
}

/// Keep only entries whose state is Running or Unknown.
pub fn filter_for_sync<K>(states: HashMap<K, VmState>) -> HashMap<K, VmState>
where
    K: Eq + Hash,
{
    states
        .into_iter()
        .filter(|(_, state)| is_sync_tracked(*state))
        .collect()
}
