use std::collections::HashMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::VmId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncReportError {
    #[error("duplicate vm id '{0}' in sync report")]
    DuplicateVm(VmId),
}

/// Result of one sync call: the host's per-VM raw state tokens plus the
/// agent's own success flag and error detail.
///
/// This is also the body of the agent's reply to [`crate::wire::VM_SYNC_PATH`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub states: SyncStates,
}

impl SyncReport {
    /// Successful report from `(vm, token)` pairs; duplicate VMs are rejected.
    pub fn from_entries<I, V, T>(entries: I) -> Result<Self, SyncReportError>
    where
        I: IntoIterator<Item = (V, T)>,
        V: Into<VmId>,
        T: Into<String>,
    {
        Ok(Self {
            success: true,
            error: None,
            states: SyncStates::try_from_entries(entries)?,
        })
    }

    /// Report carrying the agent's own failure detail.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            states: SyncStates::default(),
        }
    }
}

/// VM id → raw token map whose keys are unique by construction.
///
/// Decoding a JSON object with a repeated key is an error rather than
/// last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SyncStates(HashMap<VmId, String>);

impl SyncStates {
    pub fn try_from_entries<I, V, T>(entries: I) -> Result<Self, SyncReportError>
    where
        I: IntoIterator<Item = (V, T)>,
        V: Into<VmId>,
        T: Into<String>,
    {
        let mut states = HashMap::new();
        for (vm, token) in entries {
            let vm = vm.into();
            if states.contains_key(&vm) {
                return Err(SyncReportError::DuplicateVm(vm));
            }
            states.insert(vm, token.into());
        }
        Ok(Self(states))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, vm: &VmId) -> Option<&str> {
        self.0.get(vm).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VmId, &str)> {
        self.0.iter().map(|(vm, token)| (vm, token.as_str()))
    }
}

impl IntoIterator for SyncStates {
    type Item = (VmId, String);
    type IntoIter = std::collections::hash_map::IntoIter<VmId, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'de> Deserialize<'de> for SyncStates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StatesVisitor;

        impl<'de> Visitor<'de> for StatesVisitor {
            type Value = SyncStates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of vm id to state token")
            }

            // Agents send `null` when they have nothing to report.
            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SyncStates::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut states = HashMap::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((vm, token)) = map.next_entry::<VmId, String>()? {
                    if states.contains_key(&vm) {
                        return Err(de::Error::custom(SyncReportError::DuplicateVm(vm)));
                    }
                    states.insert(vm, token);
                }
                Ok(SyncStates(states))
            }
        }

        deserializer.deserialize_any(StatesVisitor)
    }
}
