//! Time-shared slot allocation which scales all VMs down when the machine is oversubscribed.

use indexmap::IndexMap;

use crate::error::SchedulingError;
use crate::slot::ProcessingSlot;
use crate::vm_scheduler::{VmScheduler, VmSchedulerState};
use crate::vm_schedulers::time_shared::TimeSharedVmScheduler;

/// Accepts every request. Requests above the slot MIPS are capped, and when the machine can't satisfy all requests
/// the allocations of all VMs are recomputed proportionally to the physical capacity.
pub struct TimeSharedOverSubscribedVmScheduler {
    base: TimeSharedVmScheduler,
}

impl TimeSharedOverSubscribedVmScheduler {
    pub fn new(slots: Vec<ProcessingSlot>) -> Self {
        Self {
            base: TimeSharedVmScheduler::new(slots),
        }
    }

    pub fn requested_mips_for_vm(&self, vm_key: &str) -> Option<&[f64]> {
        self.base.requested_mips_for_vm(vm_key)
    }

    pub fn slots_in_use(&self) -> u32 {
        self.base.slots_in_use()
    }

    fn admit(base: &mut TimeSharedVmScheduler, vm_key: &str, requested: &[f64]) -> bool {
        let capped = cap_request(requested, base.pe_capacity());
        base.requested.insert(vm_key.to_owned(), requested.to_vec());
        base.slots_in_use += requested.len() as u32;

        let total = base.state.admission_total(vm_key, capped.iter().sum());
        if base.state.available_mips >= total {
            let allocated = capped.iter().map(|mips| base.state.taxed(vm_key, *mips)).collect();
            base.state.mips_map.insert(vm_key.to_owned(), allocated);
            base.state.available_mips -= total;
        } else {
            redistribute(base);
        }
        true
    }
}

/// Caps every entry at the slot MIPS.
fn cap_request(requested: &[f64], pe_capacity: f64) -> Vec<f64> {
    requested.iter().map(|mips| mips.min(pe_capacity)).collect()
}

/// Recomputes allocations of all tracked requests scaled to the physical capacity.
fn redistribute(base: &mut TimeSharedVmScheduler) {
    let pe_capacity = base.pe_capacity();
    let mut capped_requests = IndexMap::new();
    let mut total_required = 0.;
    for (vm_key, requested) in base.requested.iter() {
        let capped = cap_request(requested, pe_capacity);
        total_required += base.state.admission_total(vm_key, capped.iter().sum());
        capped_requests.insert(vm_key.clone(), capped);
    }

    let scale = base.total_mips() / total_required;
    base.state.mips_map.clear();
    for (vm_key, capped) in capped_requests {
        let allocated = capped
            .iter()
            .map(|mips| (base.state.taxed(&vm_key, *mips) * scale).floor())
            .collect();
        base.state.mips_map.insert(vm_key, allocated);
    }
    base.state.available_mips = 0.;
}

impl VmScheduler for TimeSharedOverSubscribedVmScheduler {
    fn allocate_slots_for_vm(
        &mut self,
        vm_key: &str,
        in_migration: bool,
        requested: &[f64],
    ) -> Result<bool, SchedulingError> {
        self.base.state.track_migration(vm_key, in_migration);
        let admitted = self.base.replace(vm_key, requested, Self::admit);
        self.base.update_slot_provisioning()?;
        Ok(admitted)
    }

    fn deallocate_slots_for_vm(&mut self, vm_key: &str) -> Result<(), SchedulingError> {
        if self.base.requested_mips_for_vm(vm_key).is_none() {
            return Ok(());
        }
        self.base.release(vm_key, Self::admit);
        self.base.update_slot_provisioning()
    }

    fn deallocate_slots_for_all_vms(&mut self) {
        self.base.deallocate_slots_for_all_vms();
    }

    fn state(&self) -> &VmSchedulerState {
        &self.base.state
    }

    fn state_mut(&mut self) -> &mut VmSchedulerState {
        &mut self.base.state
    }
}
