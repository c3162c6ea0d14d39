use crate::{StoreError, StoreResult, VmRecord, VmStore};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use vmsync_types::{HostId, VmId, VmState};

#[derive(Clone, Default)]
pub struct MemVmStore {
    vms: Arc<RwLock<HashMap<VmId, VmRecord>>>,
}

impl std::fmt::Debug for MemVmStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.vms.read().map(|vms| vms.len()).unwrap_or_default();
        f.debug_struct("MemVmStore").field("vms", &len).finish()
    }
}

impl MemVmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = VmRecord>) -> Self {
        let store = Self::new();
        for record in records {
            // A fresh store cannot be poisoned.
            let _ = store.upsert(record);
        }
        store
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<VmId, VmRecord>>> {
        self.vms.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<VmId, VmRecord>>> {
        self.vms.write().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or replace a VM row.
    pub fn upsert(&self, record: VmRecord) -> StoreResult<()> {
        self.write()?.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, vm: &VmId) -> StoreResult<Option<VmRecord>> {
        Ok(self.read()?.get(vm).cloned())
    }

    pub fn remove(&self, vm: &VmId) -> StoreResult<Option<VmRecord>> {
        Ok(self.write()?.remove(vm))
    }

    /// Unconditionally overwrite the state of an existing VM.
    pub fn set_state(&self, vm: &VmId, state: VmState) -> StoreResult<bool> {
        let mut vms = self.write()?;
        match vms.get_mut(vm) {
            Some(record) => {
                record.state = state;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.read()?.is_empty())
    }
}

impl VmStore for MemVmStore {
    fn find_state(&self, vm: &VmId) -> StoreResult<Option<VmState>> {
        Ok(self.read()?.get(vm).map(|record| record.state))
    }

    fn find_vms_by_host_and_state(&self, host: &HostId, state: VmState) -> StoreResult<Vec<VmId>> {
        let vms = self.read()?;
        let mut ids: Vec<VmId> = vms
            .values()
            .filter(|record| record.state == state && record.host_id.as_ref() == Some(host))
            .map(|record| record.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn compare_and_set_state(
        &self,
        vm: &VmId,
        expected: VmState,
        new: VmState,
    ) -> StoreResult<bool> {
        let mut vms = self.write()?;
        match vms.get_mut(vm) {
            Some(record) if record.state == expected => {
                record.state = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
