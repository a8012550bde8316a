//! Per-resource allocation bookkeeping.
//!
//! [`ResourceProvisioner`] tracks the RAM or bandwidth of a machine allocated to each VM, [`SlotProvisioner`] tracks
//! the MIPS of one processing slot given to each VM. Both are keyed by VM key and keep insertion order.

use indexmap::IndexMap;

use crate::EPSILON;

/// Bookkeeping for a scalar machine resource (RAM or bandwidth).
#[derive(Clone, Debug)]
pub struct ResourceProvisioner {
    total: u64,
    available: u64,
    allocations: IndexMap<String, u64>,
}

impl ResourceProvisioner {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            available: total,
            allocations: IndexMap::new(),
        }
    }

    /// Allocates the requested amount for the VM, capped at the VM nominal amount.
    ///
    /// Replaces the previous allocation of the VM. On failure the VM has no allocation afterwards.
    pub fn allocate_for_vm(&mut self, vm_key: &str, nominal: u64, requested: u64) -> bool {
        let amount = requested.min(nominal);
        self.deallocate_for_vm(vm_key);
        if self.available >= amount {
            self.available -= amount;
            self.allocations.insert(vm_key.to_owned(), amount);
            true
        } else {
            false
        }
    }

    /// Releases the allocation of the VM, if any.
    pub fn deallocate_for_vm(&mut self, vm_key: &str) {
        if let Some(amount) = self.allocations.shift_remove(vm_key) {
            self.available += amount;
        }
    }

    pub fn deallocate_for_all_vms(&mut self) {
        self.allocations.clear();
        self.available = self.total;
    }

    /// Checks whether the VM allocation can be set to the requested amount without changing the state.
    pub fn is_suitable_for_vm(&self, vm_key: &str, nominal: u64, requested: u64) -> bool {
        self.available + self.allocated_for_vm(vm_key) >= requested.min(nominal)
    }

    pub fn allocated_for_vm(&self, vm_key: &str) -> u64 {
        self.allocations.get(vm_key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn used(&self) -> u64 {
        self.total - self.available
    }
}

/// Bookkeeping of the MIPS of one processing slot shared between VMs.
#[derive(Clone, Debug)]
pub struct SlotProvisioner {
    mips: f64,
    available: f64,
    allocations: IndexMap<String, Vec<f64>>,
}

impl SlotProvisioner {
    pub fn new(mips: f64) -> Self {
        Self {
            mips,
            available: mips,
            allocations: IndexMap::new(),
        }
    }

    /// Gives the specified MIPS of this slot to one virtual slot of the VM.
    pub fn allocate_mips_for_vm(&mut self, vm_key: &str, mips: f64) -> bool {
        if self.available + EPSILON < mips {
            return false;
        }
        self.available = (self.available - mips).max(0.);
        self.allocations.entry(vm_key.to_owned()).or_default().push(mips);
        true
    }

    pub fn deallocate_mips_for_vm(&mut self, vm_key: &str) {
        if let Some(mips) = self.allocations.shift_remove(vm_key) {
            self.available += mips.iter().sum::<f64>();
        }
    }

    pub fn deallocate_mips_for_all_vms(&mut self) {
        self.allocations.clear();
        self.available = self.mips;
    }

    pub fn allocated_mips_for_vm(&self, vm_key: &str) -> Option<&[f64]> {
        self.allocations.get(vm_key).map(|mips| mips.as_slice())
    }

    pub fn total_allocated_mips_for_vm(&self, vm_key: &str) -> f64 {
        self.allocated_mips_for_vm(vm_key)
            .map(|mips| mips.iter().sum())
            .unwrap_or(0.)
    }

    pub fn total_allocated_mips(&self) -> f64 {
        self.mips - self.available
    }

    pub fn available_mips(&self) -> f64 {
        self.available
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    /// Returns the fraction of slot MIPS allocated to VMs.
    pub fn utilization(&self) -> f64 {
        if self.mips == 0. {
            return 0.;
        }
        self.total_allocated_mips() / self.mips
    }

    /// Returns whether any VM holds a non-zero share of this slot.
    pub fn is_used(&self) -> bool {
        self.allocations.values().any(|mips| mips.iter().any(|m| *m > 0.))
    }
}
