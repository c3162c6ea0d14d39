//! JSON inventory of managed hosts and the VMs bound to them.
//!
//! ```json
//! {
//!   "hosts": [{ "id": "h1", "address": "10.0.0.11" }],
//!   "vms": [{ "id": "vm-1", "state": "Running", "host_id": "h1" }]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use vmsync_types::{HostId, HostInfo};

use crate::{MemVmStore, StoreError, StoreResult, VmRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub hosts: Vec<HostInfo>,
    #[serde(default)]
    pub vms: Vec<VmRecord>,
}

impl Inventory {
    /// Reject duplicate ids and VMs bound to hosts the inventory does not list.
    pub fn validate(&self) -> StoreResult<()> {
        let mut hosts = HashSet::new();
        for host in &self.hosts {
            if !hosts.insert(&host.id) {
                return Err(StoreError::Inventory(format!("duplicate host id '{}'", host.id)));
            }
        }
        let mut vms = HashSet::new();
        for vm in &self.vms {
            if !vms.insert(&vm.id) {
                return Err(StoreError::Inventory(format!("duplicate vm id '{}'", vm.id)));
            }
            if let Some(host) = &vm.host_id {
                if !hosts.contains(host) {
                    return Err(StoreError::Inventory(format!(
                        "vm '{}' is bound to unknown host '{}'",
                        vm.id, host
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn host(&self, id: &HostId) -> Option<&HostInfo> {
        self.hosts.iter().find(|host| &host.id == id)
    }

    /// Seed an in-memory store with the inventory's VM rows.
    pub fn to_store(&self) -> MemVmStore {
        MemVmStore::with_records(self.vms.iter().cloned())
    }
}

/// Read and validate an inventory file.
pub fn load_inventory(path: &Path) -> StoreResult<Inventory> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let inventory: Inventory =
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    inventory.validate()?;
    Ok(inventory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VmStore;
    use std::io::Write;
    use vmsync_types::{VmId, VmState};

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_hosts_and_seeds_store() {
        let file = write_file(
            r#"{
                "hosts": [{"id": "h1", "address": "10.0.0.11"}],
                "vms": [
                    {"id": "vm-1", "state": "Running", "host_id": "h1"},
                    {"id": "vm-2", "state": "Stopped"}
                ]
            }"#,
        );
        let inventory = load_inventory(file.path()).unwrap();
        assert_eq!(inventory.hosts.len(), 1);
        assert_eq!(
            inventory.host(&HostId::new("h1")).map(|h| h.address.as_str()),
            Some("10.0.0.11")
        );

        let store = inventory.to_store();
        assert_eq!(
            store.find_state(&VmId::new("vm-1")).unwrap(),
            Some(VmState::Running)
        );
        assert_eq!(
            store.get(&VmId::new("vm-2")).unwrap().and_then(|r| r.host_id),
            None
        );
    }

    #[test]
    fn vm_bound_to_unknown_host_is_rejected() {
        let file = write_file(r#"{"vms": [{"id": "vm-1", "state": "Running", "host_id": "nope"}]}"#);
        let err = load_inventory(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::Inventory(_)), "{err}");
    }

    #[test]
    fn duplicate_host_is_rejected() {
        let inventory = Inventory {
            hosts: vec![HostInfo::new("h1", "a"), HostInfo::new("h1", "b")],
            vms: vec![],
        };
        assert!(matches!(inventory.validate(), Err(StoreError::Inventory(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match load_inventory(&path) {
            Err(StoreError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected io error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        let file = write_file("{ not json");
        assert!(matches!(load_inventory(file.path()), Err(StoreError::Json { .. })));
    }
}
