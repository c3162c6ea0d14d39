use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Canonical VM runtime state as recorded by the control plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Rebooting,
    Migrating,
    Pausing,
    Paused,
    Resuming,
    Destroying,
    Destroyed,
    Unknown,
    Error,
}

impl VmState {
    pub const ALL: [VmState; 14] = [
        VmState::Created,
        VmState::Starting,
        VmState::Running,
        VmState::Stopping,
        VmState::Stopped,
        VmState::Rebooting,
        VmState::Migrating,
        VmState::Pausing,
        VmState::Paused,
        VmState::Resuming,
        VmState::Destroying,
        VmState::Destroyed,
        VmState::Unknown,
        VmState::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VmState::Created => "Created",
            VmState::Starting => "Starting",
            VmState::Running => "Running",
            VmState::Stopping => "Stopping",
            VmState::Stopped => "Stopped",
            VmState::Rebooting => "Rebooting",
            VmState::Migrating => "Migrating",
            VmState::Pausing => "Pausing",
            VmState::Paused => "Paused",
            VmState::Resuming => "Resuming",
            VmState::Destroying => "Destroying",
            VmState::Destroyed => "Destroyed",
            VmState::Unknown => "Unknown",
            VmState::Error => "Error",
        }
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A canonical state name that is not part of [`VmState`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown vm state name '{0}'")]
pub struct UnknownVmState(pub String);

/// Parses canonical names exactly as [`VmState::as_str`] renders them.
///
/// Host tokens (`running`, `shutoff`, ...) go through [`crate::translate`]
/// instead; this is for peers that already speak canonical states.
impl FromStr for VmState {
    type Err = UnknownVmState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VmState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownVmState(s.to_string()))
    }
}
