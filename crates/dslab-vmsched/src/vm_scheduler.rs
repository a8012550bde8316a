//! Allocation of machine processing slots to VMs.

use indexmap::{IndexMap, IndexSet};
use sugars::boxed;

use crate::config::options::parse_config_value;
use crate::error::SchedulingError;
use crate::provisioner::SlotProvisioner;
use crate::slot::{self, ProcessingSlot, SlotStatus};
use crate::vm_schedulers::oversubscribed::TimeSharedOverSubscribedVmScheduler;
use crate::vm_schedulers::space_shared::SpaceSharedVmScheduler;
use crate::vm_schedulers::time_shared::TimeSharedVmScheduler;

/// Share of the requested MIPS given to a VM migrating out of the machine.
pub const MIGRATION_OUT_SHARE: f64 = 0.9;
/// Share of the requested MIPS reserved for a VM migrating into the machine.
pub const MIGRATION_IN_SHARE: f64 = 0.1;

/// Trait for implementation of slot allocation policies.
///
/// Allocations are keyed by VM key, so repeated allocate/deallocate calls for the same VM replace its allocation
/// instead of accumulating it.
pub trait VmScheduler {
    /// Tries to allocate the requested MIPS per virtual slot to VM.
    ///
    /// Returns `Ok(false)` if the request can't be satisfied, errors indicate broken slot bookkeeping.
    fn allocate_slots_for_vm(
        &mut self,
        vm_key: &str,
        in_migration: bool,
        requested: &[f64],
    ) -> Result<bool, SchedulingError>;

    /// Releases slots allocated to VM. Does nothing for unknown VMs.
    fn deallocate_slots_for_vm(&mut self, vm_key: &str) -> Result<(), SchedulingError>;

    /// Releases all allocations.
    fn deallocate_slots_for_all_vms(&mut self) {
        self.state_mut().reset();
    }

    fn state(&self) -> &VmSchedulerState;

    fn state_mut(&mut self) -> &mut VmSchedulerState;

    /// Returns MIPS allocated to each virtual slot of VM.
    fn allocated_mips_for_vm(&self, vm_key: &str) -> Option<&[f64]> {
        self.state().mips_map.get(vm_key).map(|mips| mips.as_slice())
    }

    fn total_allocated_mips_for_vm(&self, vm_key: &str) -> f64 {
        self.allocated_mips_for_vm(vm_key)
            .map(|mips| mips.iter().sum())
            .unwrap_or(0.)
    }

    /// Returns MIPS which are not allocated to VMs.
    fn available_mips(&self) -> f64 {
        self.state().available_mips
    }

    /// Returns the maximum MIPS available on one slot.
    fn max_available_mips(&self) -> f64 {
        self.state()
            .provisioners
            .iter()
            .map(|provisioner| provisioner.available_mips())
            .fold(0., f64::max)
    }

    /// Returns MIPS of one slot (slots of a machine are identical).
    fn pe_capacity(&self) -> f64 {
        self.state().slots.first().map(|slot| slot.mips()).unwrap_or(0.)
    }

    fn total_mips(&self) -> f64 {
        slot::total_mips(&self.state().slots)
    }

    fn slots(&self) -> &[ProcessingSlot] {
        &self.state().slots
    }

    /// Returns ids of the slots used by VM.
    fn slots_for_vm(&self, vm_key: &str) -> &[u32] {
        self.state()
            .slot_map
            .get(vm_key)
            .map(|slots| slots.as_slice())
            .unwrap_or(&[])
    }

    fn slot_provisioner(&self, slot_id: u32) -> Option<&SlotProvisioner> {
        self.state().provisioners.get(slot_id as usize)
    }

    fn set_slot_status(&mut self, slot_id: u32, status: SlotStatus) -> bool {
        match self.state_mut().slots.get_mut(slot_id as usize) {
            Some(slot) => {
                slot.set_status(status);
                true
            }
            None => false,
        }
    }

    fn migrating_in(&self) -> &IndexSet<String> {
        &self.state().migrating_in
    }

    fn migrating_out(&self) -> &IndexSet<String> {
        &self.state().migrating_out
    }

    fn add_migrating_in(&mut self, vm_key: &str) {
        self.state_mut().migrating_in.insert(vm_key.to_owned());
    }

    fn remove_migrating_in(&mut self, vm_key: &str) {
        self.state_mut().migrating_in.shift_remove(vm_key);
    }

    fn add_migrating_out(&mut self, vm_key: &str) {
        self.state_mut().migrating_out.insert(vm_key.to_owned());
    }

    fn remove_migrating_out(&mut self, vm_key: &str) {
        self.state_mut().migrating_out.shift_remove(vm_key);
    }
}

/// Slots and allocation bookkeeping shared by all policies.
#[derive(Clone, Debug)]
pub struct VmSchedulerState {
    pub slots: Vec<ProcessingSlot>,
    pub provisioners: Vec<SlotProvisioner>,
    /// MIPS allocated to each virtual slot of VM.
    pub mips_map: IndexMap<String, Vec<f64>>,
    /// Slots used by VM.
    pub slot_map: IndexMap<String, Vec<u32>>,
    pub available_mips: f64,
    pub migrating_in: IndexSet<String>,
    pub migrating_out: IndexSet<String>,
}

impl VmSchedulerState {
    pub fn new(slots: Vec<ProcessingSlot>) -> Self {
        let provisioners = slots.iter().map(|slot| SlotProvisioner::new(slot.mips())).collect();
        let available_mips = slot::total_mips(&slots);
        Self {
            slots,
            provisioners,
            mips_map: IndexMap::new(),
            slot_map: IndexMap::new(),
            available_mips,
            migrating_in: IndexSet::new(),
            migrating_out: IndexSet::new(),
        }
    }

    /// Drops all allocations, the migration sets are kept.
    pub fn reset(&mut self) {
        self.mips_map.clear();
        self.slot_map.clear();
        self.available_mips = slot::total_mips(&self.slots);
        for provisioner in self.provisioners.iter_mut() {
            provisioner.deallocate_mips_for_all_vms();
        }
    }

    /// Updates the migrating-out set according to the VM migration flag.
    ///
    /// VM being migrated in keeps its place in the migrating-in set only.
    pub fn track_migration(&mut self, vm_key: &str, in_migration: bool) {
        if in_migration {
            if !self.migrating_in.contains(vm_key) {
                self.migrating_out.insert(vm_key.to_owned());
            }
        } else {
            self.migrating_out.shift_remove(vm_key);
        }
    }

    /// Applies the migration tax to one requested MIPS entry.
    pub fn taxed(&self, vm_key: &str, mips: f64) -> f64 {
        if self.migrating_out.contains(vm_key) {
            mips * MIGRATION_OUT_SHARE
        } else if self.migrating_in.contains(vm_key) {
            mips * MIGRATION_IN_SHARE
        } else {
            mips
        }
    }

    /// Returns the part of the total request counted against available MIPS.
    pub fn admission_total(&self, vm_key: &str, total: f64) -> f64 {
        if self.migrating_in.contains(vm_key) {
            total * MIGRATION_IN_SHARE
        } else {
            total
        }
    }

    /// Marks slots used by any VM as busy and the others as free, failed slots keep their status.
    pub fn refresh_slot_statuses(&mut self) {
        for (slot, provisioner) in self.slots.iter_mut().zip(self.provisioners.iter()) {
            if slot.is_failed() {
                continue;
            }
            if provisioner.is_used() {
                slot.set_status(SlotStatus::Busy);
            } else {
                slot.set_status(SlotStatus::Free);
            }
        }
    }
}

/// Creates VM scheduler from config value string.
pub fn vm_scheduler_resolver(
    config_str: &str,
    slots: Vec<ProcessingSlot>,
) -> Result<Box<dyn VmScheduler>, SchedulingError> {
    let (name, _) = parse_config_value(config_str);
    match name.as_str() {
        "TimeShared" => Ok(boxed!(TimeSharedVmScheduler::new(slots))),
        "TimeSharedOverSubscribed" => Ok(boxed!(TimeSharedOverSubscribedVmScheduler::new(slots))),
        "SpaceShared" => Ok(boxed!(SpaceSharedVmScheduler::new(slots))),
        _ => Err(SchedulingError::Config(format!("can't resolve VM scheduler: {}", config_str))),
    }
}
