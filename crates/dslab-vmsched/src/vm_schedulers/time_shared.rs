//! Time-shared slot allocation without oversubscription.

use indexmap::IndexMap;

use crate::error::SchedulingError;
use crate::slot::ProcessingSlot;
use crate::vm_scheduler::{VmScheduler, VmSchedulerState};

/// Slot remainder below this amount of MIPS is ignored when packing allocations over slots.
const PACKING_THRESHOLD: f64 = 0.1;

/// Shares slots between VMs, a VM gets the requested MIPS only if the machine has enough unallocated MIPS.
///
/// VMs migrating out of the machine get 90% of the requested MIPS, VMs migrating in get 10%.
pub struct TimeSharedVmScheduler {
    pub(crate) state: VmSchedulerState,
    pub(crate) requested: IndexMap<String, Vec<f64>>,
    pub(crate) slots_in_use: u32,
}

impl TimeSharedVmScheduler {
    pub fn new(slots: Vec<ProcessingSlot>) -> Self {
        Self {
            state: VmSchedulerState::new(slots),
            requested: IndexMap::new(),
            slots_in_use: 0,
        }
    }

    /// Returns MIPS per virtual slot requested by VM.
    pub fn requested_mips_for_vm(&self, vm_key: &str) -> Option<&[f64]> {
        self.requested.get(vm_key).map(|mips| mips.as_slice())
    }

    /// Returns the number of virtual slots of the admitted VMs.
    pub fn slots_in_use(&self) -> u32 {
        self.slots_in_use
    }

    fn admit(&mut self, vm_key: &str, requested: &[f64]) -> bool {
        let pe_capacity = self.pe_capacity();
        if requested.iter().any(|mips| *mips > pe_capacity) {
            return false;
        }
        let total = self.state.admission_total(vm_key, requested.iter().sum());
        if self.state.available_mips < total {
            return false;
        }
        self.requested.insert(vm_key.to_owned(), requested.to_vec());
        self.slots_in_use += requested.len() as u32;
        let allocated = requested.iter().map(|mips| self.state.taxed(vm_key, *mips)).collect();
        self.state.mips_map.insert(vm_key.to_owned(), allocated);
        self.state.available_mips -= total;
        true
    }

    /// Drops the request of VM and admits the remaining requests from scratch.
    ///
    /// `admit` is the admission rule of the concrete policy.
    pub(crate) fn release<F>(&mut self, vm_key: &str, mut admit: F)
    where
        F: FnMut(&mut Self, &str, &[f64]) -> bool,
    {
        self.requested.shift_remove(vm_key);
        self.slots_in_use = 0;
        self.state.reset();
        let requests: Vec<(String, Vec<f64>)> = self
            .requested
            .iter()
            .map(|(key, mips)| (key.clone(), mips.clone()))
            .collect();
        for (key, mips) in requests {
            admit(self, &key, &mips);
        }
    }

    /// Allocates the request replacing the previous allocation of VM.
    ///
    /// If the new request is rejected, the previous one is restored.
    pub(crate) fn replace<F>(&mut self, vm_key: &str, requested: &[f64], mut admit: F) -> bool
    where
        F: FnMut(&mut Self, &str, &[f64]) -> bool,
    {
        let previous = self.requested.get(vm_key).cloned();
        if previous.is_some() {
            self.release(vm_key, &mut admit);
        }
        let admitted = admit(self, vm_key, requested);
        if !admitted {
            if let Some(previous) = previous {
                admit(self, vm_key, &previous);
            }
        }
        admitted
    }

    /// Rebuilds slot bookkeeping by packing the allocated MIPS of each VM over slots in slot order.
    pub(crate) fn update_slot_provisioning(&mut self) -> Result<(), SchedulingError> {
        let state = &mut self.state;
        state.slot_map.clear();
        for provisioner in state.provisioners.iter_mut() {
            provisioner.deallocate_mips_for_all_vms();
        }
        if state.slots.is_empty() {
            return Ok(());
        }

        let mut slot_idx = 0;
        let mut available = state.provisioners[slot_idx].available_mips();
        for (vm_key, allocated) in state.mips_map.iter() {
            let used_slots = state.slot_map.entry(vm_key.clone()).or_default();
            for mips in allocated.iter() {
                let mut mips = *mips;
                while mips >= PACKING_THRESHOLD {
                    let taken = mips.min(available);
                    if taken > 0. {
                        if !state.provisioners[slot_idx].allocate_mips_for_vm(vm_key, taken) {
                            return Err(SchedulingError::InsufficientSlotCapacity {
                                vm: vm_key.clone(),
                                remaining: mips,
                            });
                        }
                        used_slots.push(state.slots[slot_idx].id);
                    }
                    if available >= mips {
                        available -= mips;
                        break;
                    }
                    // slot is full
                    mips -= available;
                    available = 0.;
                    if mips <= PACKING_THRESHOLD {
                        break;
                    }
                    slot_idx += 1;
                    if slot_idx == state.slots.len() {
                        return Err(SchedulingError::InsufficientSlotCapacity {
                            vm: vm_key.clone(),
                            remaining: mips,
                        });
                    }
                    available = state.provisioners[slot_idx].available_mips();
                }
            }
        }
        state.refresh_slot_statuses();
        Ok(())
    }
}

impl VmScheduler for TimeSharedVmScheduler {
    fn allocate_slots_for_vm(
        &mut self,
        vm_key: &str,
        in_migration: bool,
        requested: &[f64],
    ) -> Result<bool, SchedulingError> {
        self.state.track_migration(vm_key, in_migration);
        let admitted = self.replace(vm_key, requested, Self::admit);
        self.update_slot_provisioning()?;
        Ok(admitted)
    }

    fn deallocate_slots_for_vm(&mut self, vm_key: &str) -> Result<(), SchedulingError> {
        if !self.requested.contains_key(vm_key) {
            return Ok(());
        }
        self.release(vm_key, Self::admit);
        self.update_slot_provisioning()
    }

    fn deallocate_slots_for_all_vms(&mut self) {
        self.state.reset();
        self.requested.clear();
        self.slots_in_use = 0;
        self.state.refresh_slot_statuses();
    }

    fn state(&self) -> &VmSchedulerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VmSchedulerState {
        &mut self.state
    }
}
