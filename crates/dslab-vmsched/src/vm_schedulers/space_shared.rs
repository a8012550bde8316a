//! Space-shared slot allocation: each virtual slot gets a dedicated physical slot.

use crate::error::SchedulingError;
use crate::slot::{ProcessingSlot, SlotStatus};
use crate::vm_scheduler::{VmScheduler, VmSchedulerState};

/// Gives whole free slots to VMs. A VM is accepted only if every requested entry can be placed on its own free slot
/// with enough MIPS, otherwise nothing is allocated.
pub struct SpaceSharedVmScheduler {
    state: VmSchedulerState,
    free_slots: Vec<u32>,
}

impl SpaceSharedVmScheduler {
    pub fn new(slots: Vec<ProcessingSlot>) -> Self {
        let free_slots = (0..slots.len() as u32).collect();
        Self {
            state: VmSchedulerState::new(slots),
            free_slots,
        }
    }

    /// Returns indices of the slots not used by VMs in the order they will be given out.
    pub fn free_slots(&self) -> &[u32] {
        &self.free_slots
    }

    /// Gives the slots to VM, `mips` holds the MIPS taken from each of them.
    fn occupy(&mut self, vm_key: &str, slot_indices: &[usize], mips: &[f64]) {
        let mut slot_ids = Vec::with_capacity(slot_indices.len());
        for (slot_idx, slot_mips) in slot_indices.iter().zip(mips) {
            self.state.provisioners[*slot_idx].allocate_mips_for_vm(vm_key, *slot_mips);
            if !self.state.slots[*slot_idx].is_failed() {
                self.state.slots[*slot_idx].set_status(SlotStatus::Busy);
            }
            slot_ids.push(self.state.slots[*slot_idx].id);
        }
        self.free_slots.retain(|idx| !slot_indices.contains(&(*idx as usize)));
        self.state.available_mips -= mips.iter().sum::<f64>();
        self.state.mips_map.insert(vm_key.to_owned(), mips.to_vec());
        self.state.slot_map.insert(vm_key.to_owned(), slot_ids);
    }

    /// Matches requested entries with free slots in order, skipping slots which are too slow.
    fn select_slots(&self, requested: &[f64]) -> Option<Vec<usize>> {
        if self.free_slots.len() < requested.len() {
            return None;
        }
        let mut selected = Vec::with_capacity(requested.len());
        let mut free = self.free_slots.iter().enumerate();
        for mips in requested {
            loop {
                let (pos, slot_idx) = free.next()?;
                if *mips <= self.state.slots[*slot_idx as usize].mips() {
                    selected.push(pos);
                    break;
                }
            }
        }
        Some(selected)
    }
}

impl VmScheduler for SpaceSharedVmScheduler {
    fn allocate_slots_for_vm(
        &mut self,
        vm_key: &str,
        in_migration: bool,
        requested: &[f64],
    ) -> Result<bool, SchedulingError> {
        let previous = self
            .state
            .mips_map
            .get(vm_key)
            .cloned()
            .zip(self.state.slot_map.get(vm_key).cloned());
        self.deallocate_slots_for_vm(vm_key)?;
        self.state.track_migration(vm_key, in_migration);
        match self.select_slots(requested) {
            Some(selected) => {
                let slot_indices: Vec<usize> = selected.iter().map(|pos| self.free_slots[*pos] as usize).collect();
                self.occupy(vm_key, &slot_indices, requested);
                Ok(true)
            }
            None => {
                // rejected request keeps the previous allocation
                if let Some((mips, slot_ids)) = previous {
                    let slot_indices: Vec<usize> = slot_ids
                        .iter()
                        .filter_map(|id| self.state.slots.iter().position(|slot| slot.id == *id))
                        .collect();
                    self.occupy(vm_key, &slot_indices, &mips);
                }
                Ok(false)
            }
        }
    }

    fn deallocate_slots_for_vm(&mut self, vm_key: &str) -> Result<(), SchedulingError> {
        let slot_ids = match self.state.slot_map.shift_remove(vm_key) {
            Some(slot_ids) => slot_ids,
            None => return Ok(()),
        };
        if let Some(mips) = self.state.mips_map.shift_remove(vm_key) {
            self.state.available_mips += mips.iter().sum::<f64>();
        }
        for slot_id in slot_ids {
            if let Some(slot_idx) = self.state.slots.iter().position(|slot| slot.id == slot_id) {
                self.state.provisioners[slot_idx].deallocate_mips_for_vm(vm_key);
                if !self.state.slots[slot_idx].is_failed() {
                    self.state.slots[slot_idx].set_status(SlotStatus::Free);
                }
                self.free_slots.push(slot_idx as u32);
            }
        }
        Ok(())
    }

    fn deallocate_slots_for_all_vms(&mut self) {
        self.state.reset();
        self.state.refresh_slot_statuses();
        self.free_slots = (0..self.state.slots.len() as u32).collect();
    }

    fn state(&self) -> &VmSchedulerState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut VmSchedulerState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::make_slots;

    #[test]
    fn released_slots_are_given_out_last() {
        let mut scheduler = SpaceSharedVmScheduler::new(make_slots(3, 1000.));
        assert!(scheduler.allocate_slots_for_vm("0-0", false, &[1000.]).unwrap());
        assert!(scheduler.allocate_slots_for_vm("0-1", false, &[500.]).unwrap());
        scheduler.deallocate_slots_for_vm("0-0").unwrap();
        assert_eq!(scheduler.free_slots(), &[2, 0]);
        assert!(scheduler.allocate_slots_for_vm("0-2", false, &[800.]).unwrap());
        assert_eq!(scheduler.slots_for_vm("0-2"), &[2]);
        assert_eq!(scheduler.available_mips(), 1700.);
    }
}
