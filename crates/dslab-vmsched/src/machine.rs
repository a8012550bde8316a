//! Physical machine hosting VMs.

use indexmap::IndexMap;
use serde::Serialize;

use crate::context::SchedulingContext;
use crate::error::SchedulingError;
use crate::job::{Job, JobId, JobStatus};
use crate::provisioner::ResourceProvisioner;
use crate::slot::{self, SlotStatus};
use crate::vm::VirtualMachine;
use crate::vm_scheduler::{VmScheduler, MIGRATION_OUT_SHARE};
use crate::{log_debug, log_trace, log_warn};

/// Allocated MIPS below the requested ones by more than this amount are reported as under-allocation.
const UNDER_ALLOCATION_THRESHOLD: f64 = 0.1;

/// Reason of VM creation failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AllocationVerdict {
    NotEnoughStorage,
    NotEnoughRam,
    NotEnoughBandwidth,
    NotEnoughSlots,
}

/// Outcome of [`Machine::create_vm`]. Rejected VM is returned to the caller.
pub enum VmCreation {
    Created,
    Rejected(AllocationVerdict, Box<VirtualMachine>),
}

impl VmCreation {
    pub fn is_created(&self) -> bool {
        matches!(self, VmCreation::Created)
    }
}

/// Defines what a machine does on each update besides advancing the VMs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MachineKind {
    /// Allocations change only on VM creation, destruction and migration.
    Simple,
    /// Allocations are recomputed from the current VM demand on every update, utilization history is recorded.
    DynamicWorkload,
}

/// Utilization of machine at some moment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MachineStateHistoryEntry {
    pub time: f64,
    pub allocated_mips: f64,
    pub requested_mips: f64,
    pub is_active: bool,
}

/// Resources reserved on the destination machine for a VM being migrated in.
///
/// The VM itself stays on the source machine until the migration is completed.
#[derive(Clone, Debug)]
pub struct MigratingInVm {
    pub key: String,
    pub ram: u64,
    pub bw: u64,
    pub size: u64,
    pub requested_ram: u64,
    pub requested_bw: u64,
    pub requested_mips: Vec<f64>,
}

impl MigratingInVm {
    pub fn from_vm(vm: &VirtualMachine) -> Self {
        Self {
            key: vm.key().to_owned(),
            ram: vm.ram(),
            bw: vm.bw(),
            size: vm.size(),
            requested_ram: vm.current_requested_ram(),
            requested_bw: vm.current_requested_bw(),
            requested_mips: vm.current_requested_mips(),
        }
    }
}

/// Represents physical machine (host).
///
/// Machine owns the hosted VMs, the VM scheduler (which in turn owns the processing slots) and the RAM and bandwidth
/// bookkeeping. VMs are kept in the order of their creation, which is also the order of their processing.
pub struct Machine {
    pub id: u32,
    name: String,
    kind: MachineKind,
    ram: ResourceProvisioner,
    bw: ResourceProvisioner,
    storage: u64,
    free_storage: u64,
    cost_per_sec: f64,
    vm_scheduler: Box<dyn VmScheduler>,
    vms: IndexMap<String, VirtualMachine>,
    migrating_in: IndexMap<String, MigratingInVm>,
    failed: bool,
    utilization_mips: f64,
    previous_utilization_mips: f64,
    under_allocated_mips: IndexMap<String, f64>,
    state_history: Vec<MachineStateHistoryEntry>,
    ctx: SchedulingContext,
}

impl Machine {
    /// Creates machine with specified capacities. The machine name is taken from the context.
    pub fn new(
        id: u32,
        ram: u64,
        bw: u64,
        storage: u64,
        vm_scheduler: Box<dyn VmScheduler>,
        kind: MachineKind,
        ctx: SchedulingContext,
    ) -> Self {
        log_debug!(
            ctx,
            "created with {} slots, {} MIPS total",
            vm_scheduler.slots().len(),
            vm_scheduler.total_mips()
        );
        Self {
            id,
            name: ctx.name().to_owned(),
            kind,
            ram: ResourceProvisioner::new(ram),
            bw: ResourceProvisioner::new(bw),
            storage,
            free_storage: storage,
            cost_per_sec: 0.,
            vm_scheduler,
            vms: IndexMap::new(),
            migrating_in: IndexMap::new(),
            failed: false,
            utilization_mips: 0.,
            previous_utilization_mips: 0.,
            under_allocated_mips: IndexMap::new(),
            state_history: Vec::new(),
            ctx,
        }
    }

    /// Sets the price of one second of CPU time charged to jobs.
    pub fn with_cost_per_sec(mut self, cost_per_sec: f64) -> Self {
        self.cost_per_sec = cost_per_sec;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MachineKind {
        self.kind
    }

    pub fn cost_per_sec(&self) -> f64 {
        self.cost_per_sec
    }

    pub fn storage(&self) -> u64 {
        self.storage
    }

    pub fn free_storage(&self) -> u64 {
        self.free_storage
    }

    pub fn ram(&self) -> &ResourceProvisioner {
        &self.ram
    }

    pub fn bw(&self) -> &ResourceProvisioner {
        &self.bw
    }

    pub fn vm_scheduler(&self) -> &dyn VmScheduler {
        self.vm_scheduler.as_ref()
    }

    pub fn vm(&self, vm_key: &str) -> Option<&VirtualMachine> {
        self.vms.get(vm_key)
    }

    pub fn vm_mut(&mut self, vm_key: &str) -> Option<&mut VirtualMachine> {
        self.vms.get_mut(vm_key)
    }

    /// Returns the hosted VMs in processing order.
    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    pub fn number_of_slots(&self) -> usize {
        self.vm_scheduler.slots().len()
    }

    pub fn number_of_free_slots(&self) -> usize {
        slot::count_with_status(self.vm_scheduler.slots(), SlotStatus::Free)
    }

    pub fn number_of_busy_slots(&self) -> usize {
        slot::count_with_status(self.vm_scheduler.slots(), SlotStatus::Busy)
    }

    pub fn total_mips(&self) -> f64 {
        self.vm_scheduler.total_mips()
    }

    pub fn available_mips(&self) -> f64 {
        self.vm_scheduler.available_mips()
    }

    pub fn max_available_mips(&self) -> f64 {
        self.vm_scheduler.max_available_mips()
    }

    pub fn allocated_mips_for_vm(&self, vm_key: &str) -> Option<&[f64]> {
        self.vm_scheduler.allocated_mips_for_vm(vm_key)
    }

    pub fn total_allocated_mips_for_vm(&self, vm_key: &str) -> f64 {
        self.vm_scheduler.total_allocated_mips_for_vm(vm_key)
    }

    /// Changes status of one slot. Returns `false` if there is no such slot.
    pub fn set_slot_status(&mut self, slot_id: u32, status: SlotStatus) -> bool {
        self.vm_scheduler.set_slot_status(slot_id, status)
    }

    /// Marks all slots as failed or brings them back.
    pub fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
        let status = if failed { SlotStatus::Failed } else { SlotStatus::Free };
        for slot_id in 0..self.number_of_slots() as u32 {
            self.vm_scheduler.set_slot_status(slot_id, status);
        }
        if !failed {
            self.vm_scheduler.state_mut().refresh_slot_statuses();
        }
        log_warn!(self.ctx, "failed flag set to {}", failed);
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Checks whether the machine has enough resources for VM without changing any allocation.
    pub fn is_suitable_for_vm(&self, vm: &VirtualMachine) -> bool {
        self.vm_scheduler.pe_capacity() >= vm.current_requested_max_mips()
            && self.vm_scheduler.available_mips() >= vm.current_requested_total_mips()
            && self.ram.is_suitable_for_vm(vm.key(), vm.ram(), vm.current_requested_ram())
            && self.bw.is_suitable_for_vm(vm.key(), vm.bw(), vm.current_requested_bw())
    }

    /// Places VM on the machine allocating storage, RAM, bandwidth and slots.
    ///
    /// If any resource is not enough, the partial allocation is rolled back and VM is returned back.
    pub fn create_vm(&mut self, mut vm: VirtualMachine) -> Result<VmCreation, SchedulingError> {
        let key = vm.key().to_owned();
        if self.free_storage < vm.size() {
            log_debug!(self.ctx, "not enough storage for vm {}", key);
            return Ok(VmCreation::Rejected(AllocationVerdict::NotEnoughStorage, Box::new(vm)));
        }
        if !self.ram.allocate_for_vm(&key, vm.ram(), vm.current_requested_ram()) {
            log_debug!(self.ctx, "not enough RAM for vm {}", key);
            return Ok(VmCreation::Rejected(AllocationVerdict::NotEnoughRam, Box::new(vm)));
        }
        if !self.bw.allocate_for_vm(&key, vm.bw(), vm.current_requested_bw()) {
            log_debug!(self.ctx, "not enough bandwidth for vm {}", key);
            self.ram.deallocate_for_vm(&key);
            return Ok(VmCreation::Rejected(AllocationVerdict::NotEnoughBandwidth, Box::new(vm)));
        }
        let allocated = self
            .vm_scheduler
            .allocate_slots_for_vm(&key, vm.is_in_migration(), &vm.current_requested_mips());
        match allocated {
            Ok(true) => {}
            Ok(false) => {
                log_debug!(self.ctx, "not enough MIPS for vm {}", key);
                self.ram.deallocate_for_vm(&key);
                self.bw.deallocate_for_vm(&key);
                return Ok(VmCreation::Rejected(AllocationVerdict::NotEnoughSlots, Box::new(vm)));
            }
            Err(e) => {
                self.ram.deallocate_for_vm(&key);
                self.bw.deallocate_for_vm(&key);
                return Err(e);
            }
        }

        self.free_storage -= vm.size();
        vm.set_current_allocated_size(vm.size());
        vm.set_current_allocated_ram(self.ram.allocated_for_vm(&key));
        vm.set_current_allocated_bw(self.bw.allocated_for_vm(&key));
        vm.set_host(Some(self.id));
        vm.set_being_instantiated(false);
        let share = self.vm_scheduler.allocated_mips_for_vm(&key);
        vm.set_current_allocated_mips(share.map(|mips| mips.to_vec()).unwrap_or_default());
        vm.update_processing(self.ctx.time(), share);
        log_debug!(self.ctx, "vm {} created", key);
        self.vms.insert(key, vm);
        Ok(VmCreation::Created)
    }

    /// Removes VM from the machine releasing its resources. Returns `None` for unknown VM.
    pub fn destroy_vm(&mut self, vm_key: &str) -> Result<Option<VirtualMachine>, SchedulingError> {
        let mut vm = match self.vms.shift_remove(vm_key) {
            Some(vm) => vm,
            None => return Ok(None),
        };
        self.vm_scheduler.deallocate_slots_for_vm(vm_key)?;
        self.vm_scheduler.remove_migrating_out(vm_key);
        self.ram.deallocate_for_vm(vm_key);
        self.bw.deallocate_for_vm(vm_key);
        self.free_storage += vm.size();
        self.under_allocated_mips.shift_remove(vm_key);
        release_vm(&mut vm);
        log_debug!(self.ctx, "vm {} destroyed", vm_key);
        Ok(Some(vm))
    }

    /// Removes all VMs. Reservations of VMs being migrated in are kept.
    pub fn destroy_all_vms(&mut self) -> Result<Vec<VirtualMachine>, SchedulingError> {
        self.vm_scheduler.deallocate_slots_for_all_vms();
        self.ram.deallocate_for_all_vms();
        self.bw.deallocate_for_all_vms();
        let mut destroyed = Vec::with_capacity(self.vms.len());
        for (key, mut vm) in self.vms.drain(..) {
            self.vm_scheduler.state_mut().migrating_out.shift_remove(&key);
            self.free_storage += vm.size();
            release_vm(&mut vm);
            destroyed.push(vm);
        }
        self.under_allocated_mips.clear();
        self.reallocate_migrating_in_vms()?;
        Ok(destroyed)
    }

    /// Reserves resources for VM which is going to be migrated to this machine.
    ///
    /// VM gets 10% of the requested MIPS until the migration is completed. Failure to reserve any resource is an
    /// error, the partial reservation is rolled back.
    pub fn add_migrating_in(&mut self, vm: &VirtualMachine) -> Result<(), SchedulingError> {
        let key = vm.key();
        if self.migrating_in.contains_key(key) {
            return Ok(());
        }
        let shadow = MigratingInVm::from_vm(vm);
        if self.free_storage < shadow.size {
            return Err(migration_error(key, self.id, "storage"));
        }
        if !self.ram.allocate_for_vm(key, shadow.ram, shadow.requested_ram) {
            return Err(migration_error(key, self.id, "RAM"));
        }
        if !self.bw.allocate_for_vm(key, shadow.bw, shadow.requested_bw) {
            self.ram.deallocate_for_vm(key);
            return Err(migration_error(key, self.id, "bandwidth"));
        }
        self.vm_scheduler.add_migrating_in(key);
        let allocated = self.vm_scheduler.allocate_slots_for_vm(key, true, &shadow.requested_mips);
        if allocated != Ok(true) {
            self.ram.deallocate_for_vm(key);
            self.bw.deallocate_for_vm(key);
            self.vm_scheduler.remove_migrating_in(key);
            return Err(allocated.err().unwrap_or_else(|| migration_error(key, self.id, "MIPS")));
        }
        self.free_storage -= shadow.size;
        log_debug!(self.ctx, "reserved resources for vm {} migrating in", key);
        self.migrating_in.insert(key.to_owned(), shadow);
        self.update_all_vms_processing(self.ctx.time())?;
        Ok(())
    }

    /// Releases the reservation made by [`add_migrating_in`](Self::add_migrating_in).
    pub fn remove_migrating_in(&mut self, vm_key: &str) -> Result<(), SchedulingError> {
        let shadow = match self.migrating_in.shift_remove(vm_key) {
            Some(shadow) => shadow,
            None => return Ok(()),
        };
        self.vm_scheduler.deallocate_slots_for_vm(vm_key)?;
        self.ram.deallocate_for_vm(vm_key);
        self.bw.deallocate_for_vm(vm_key);
        self.free_storage += shadow.size;
        self.vm_scheduler.remove_migrating_in(vm_key);
        Ok(())
    }

    /// Updates the reservation of VM being migrated in with its current demand.
    pub fn refresh_migrating_in(&mut self, vm: &VirtualMachine) {
        if let Some(shadow) = self.migrating_in.get_mut(vm.key()) {
            let size = shadow.size;
            *shadow = MigratingInVm::from_vm(vm);
            shadow.size = size;
        }
    }

    /// Replaces the reservation of VM being migrated in with the VM itself.
    pub fn complete_migration_in(&mut self, mut vm: VirtualMachine) -> Result<VmCreation, SchedulingError> {
        self.remove_migrating_in(vm.key())?;
        vm.set_in_migration(false);
        self.create_vm(vm)
    }

    pub fn is_migrating_in(&self, vm_key: &str) -> bool {
        self.migrating_in.contains_key(vm_key)
    }

    pub fn migrating_in(&self) -> impl Iterator<Item = &MigratingInVm> {
        self.migrating_in.values()
    }

    /// Allocates RAM, bandwidth and slots to all VMs being migrated in, storage stays reserved.
    ///
    /// Fails with `MigrationAdmission` if some reservation doesn't fit anymore.
    pub fn reallocate_migrating_in_vms(&mut self) -> Result<(), SchedulingError> {
        for (key, shadow) in self.migrating_in.iter() {
            self.vm_scheduler.add_migrating_in(key);
            if !self.ram.allocate_for_vm(key, shadow.ram, shadow.requested_ram) {
                log_warn!(self.ctx, "can't reserve RAM for vm {} being migrated in", key);
                return Err(migration_error(key, self.id, "RAM"));
            }
            if !self.bw.allocate_for_vm(key, shadow.bw, shadow.requested_bw) {
                log_warn!(self.ctx, "can't reserve bandwidth for vm {} being migrated in", key);
                return Err(migration_error(key, self.id, "bandwidth"));
            }
            if !self.vm_scheduler.allocate_slots_for_vm(key, true, &shadow.requested_mips)? {
                log_warn!(self.ctx, "can't reserve MIPS for vm {} being migrated in", key);
                return Err(migration_error(key, self.id, "MIPS"));
            }
        }
        Ok(())
    }

    /// Marks VM as migrating out of this machine, it gets 90% of the requested MIPS until it is destroyed here.
    ///
    /// Returns `false` if VM is unknown or its slots can't be reallocated.
    pub fn start_migration_out(&mut self, vm_key: &str) -> Result<bool, SchedulingError> {
        let vm = match self.vms.get_mut(vm_key) {
            Some(vm) => vm,
            None => return Ok(false),
        };
        vm.set_in_migration(true);
        let requested = vm.current_requested_mips();
        let allocated = self.vm_scheduler.allocate_slots_for_vm(vm_key, true, &requested)?;
        log_debug!(self.ctx, "vm {} starts migrating out", vm_key);
        Ok(allocated)
    }

    /// Advances all VMs to `current_time` with the MIPS allocated to them.
    ///
    /// Returns the earliest predicted job completion or `f64::MAX` if no job is running.
    pub fn update_all_vms_processing(&mut self, current_time: f64) -> Result<f64, SchedulingError> {
        let mut smaller_time = f64::MAX;
        for (key, vm) in self.vms.iter_mut() {
            let time = vm.update_processing(current_time, self.vm_scheduler.allocated_mips_for_vm(key));
            if time > 0. && time < smaller_time {
                smaller_time = time;
            }
        }
        if self.kind == MachineKind::DynamicWorkload {
            self.update_dynamic_workload(current_time)?;
        }
        Ok(smaller_time)
    }

    fn update_dynamic_workload(&mut self, current_time: f64) -> Result<(), SchedulingError> {
        self.previous_utilization_mips = self.utilization_mips;
        self.utilization_mips = 0.;
        let mut total_requested_mips = 0.;

        self.vm_scheduler.deallocate_slots_for_all_vms();
        for (key, vm) in self.vms.iter() {
            self.vm_scheduler
                .allocate_slots_for_vm(key, vm.is_in_migration(), &vm.current_requested_mips())?;
        }
        for (key, shadow) in self.migrating_in.iter() {
            self.vm_scheduler.allocate_slots_for_vm(key, true, &shadow.requested_mips)?;
        }

        for (key, vm) in self.vms.iter_mut() {
            let requested = vm.current_requested_total_mips();
            let mut allocated = self.vm_scheduler.total_allocated_mips_for_vm(key);
            let share = self.vm_scheduler.allocated_mips_for_vm(key);
            vm.set_current_allocated_mips(share.map(|mips| mips.to_vec()).unwrap_or_default());
            if allocated + UNDER_ALLOCATION_THRESHOLD < requested {
                log_debug!(
                    self.ctx,
                    "under allocated MIPS for vm {}: {:.2} of {:.2}",
                    key,
                    allocated,
                    requested
                );
            }
            self.under_allocated_mips
                .insert(key.clone(), (requested - allocated).max(0.));
            vm.add_state_history_entry(current_time, allocated, requested, vm.is_in_migration());
            if vm.is_in_migration() {
                log_trace!(self.ctx, "vm {} is in migration", key);
                allocated *= MIGRATION_OUT_SHARE;
            }
            self.utilization_mips += allocated;
            total_requested_mips += requested;
        }
        for (key, shadow) in self.migrating_in.iter() {
            log_trace!(self.ctx, "vm {} is being migrated in", key);
            self.utilization_mips += self.vm_scheduler.total_allocated_mips_for_vm(key);
            total_requested_mips += shadow.requested_mips.iter().sum::<f64>();
        }

        self.add_state_history_entry(
            current_time,
            self.utilization_mips,
            total_requested_mips,
            self.utilization_mips > 0.,
        );
        Ok(())
    }

    /// Appends an entry to the utilization history, replacing the last one if it has the same time.
    pub fn add_state_history_entry(&mut self, time: f64, allocated_mips: f64, requested_mips: f64, is_active: bool) {
        let entry = MachineStateHistoryEntry {
            time,
            allocated_mips,
            requested_mips,
            is_active,
        };
        match self.state_history.last_mut() {
            Some(last) if last.time == time => *last = entry,
            _ => self.state_history.push(entry),
        }
    }

    pub fn state_history(&self) -> &[MachineStateHistoryEntry] {
        &self.state_history
    }

    /// Returns the MIPS used on the last update.
    pub fn utilization_mips(&self) -> f64 {
        self.utilization_mips
    }

    pub fn previous_utilization_mips(&self) -> f64 {
        self.previous_utilization_mips
    }

    /// Returns the CPU utilization (from 0 to 1) on the last update.
    pub fn utilization_of_cpu(&self) -> f64 {
        self.cpu_fraction(self.utilization_mips)
    }

    pub fn previous_utilization_of_cpu(&self) -> f64 {
        self.cpu_fraction(self.previous_utilization_mips)
    }

    fn cpu_fraction(&self, mips: f64) -> f64 {
        let total = self.total_mips();
        if total == 0. {
            return 0.;
        }
        (mips / total).min(1.)
    }

    /// Returns the used RAM.
    pub fn utilization_of_ram(&self) -> u64 {
        self.ram.used()
    }

    /// Returns the used bandwidth.
    pub fn utilization_of_bw(&self) -> u64 {
        self.bw.used()
    }

    /// Returns MIPS requested by VM beyond its allocation on the last update.
    pub fn under_allocated_mips(&self, vm_key: &str) -> f64 {
        self.under_allocated_mips.get(vm_key).copied().unwrap_or(0.)
    }

    /// Returns VMs which are not migrating and request no MIPS.
    pub fn completed_vms(&self) -> Vec<&VirtualMachine> {
        self.vms
            .values()
            .filter(|vm| !vm.is_in_migration() && vm.current_requested_total_mips() == 0.)
            .collect()
    }

    /// Returns the maximum utilization among slots.
    pub fn max_utilization(&self) -> f64 {
        self.vm_scheduler
            .state()
            .provisioners
            .iter()
            .map(|provisioner| provisioner.utilization())
            .fold(0., f64::max)
    }

    /// Returns the maximum utilization among slots used by VM.
    pub fn max_utilization_among_vm_slots(&self, vm_key: &str) -> f64 {
        self.vm_scheduler
            .state()
            .provisioners
            .iter()
            .filter(|provisioner| provisioner.allocated_mips_for_vm(vm_key).is_some())
            .map(|provisioner| provisioner.utilization())
            .fold(0., f64::max)
    }

    /// Submits job to VM. Returns `None` if there is no such VM.
    pub fn submit_job(&mut self, vm_key: &str, mut job: Job, file_transfer_time: f64) -> Option<f64> {
        let vm = self.vms.get_mut(vm_key)?;
        job.set_machine_parameter(self.id, &self.name, self.cost_per_sec);
        log_trace!(self.ctx, "job #{} submitted to vm {}", job.id(), vm_key);
        Some(vm.submit_job(job, file_transfer_time))
    }

    pub fn cancel_job(&mut self, vm_key: &str, job_id: JobId) -> Option<Job> {
        self.vms.get_mut(vm_key)?.cancel_job(job_id)
    }

    pub fn pause_job(&mut self, vm_key: &str, job_id: JobId) -> bool {
        match self.vms.get_mut(vm_key) {
            Some(vm) => vm.pause_job(job_id),
            None => false,
        }
    }

    pub fn resume_job(&mut self, vm_key: &str, job_id: JobId) -> f64 {
        match self.vms.get_mut(vm_key) {
            Some(vm) => vm.resume_job(job_id),
            None => 0.,
        }
    }

    pub fn job_status(&self, vm_key: &str, job_id: JobId) -> Option<JobStatus> {
        self.vms.get(vm_key)?.job_status(job_id)
    }

    pub fn has_finished_jobs(&self) -> bool {
        self.vms.values().any(|vm| vm.has_finished_jobs())
    }

    /// Removes finished jobs from all VMs, in VM order.
    pub fn take_finished_jobs(&mut self) -> Vec<Job> {
        let mut jobs = Vec::new();
        for vm in self.vms.values_mut() {
            while let Some(job) = vm.take_next_finished_job() {
                jobs.push(job);
            }
        }
        jobs
    }
}

fn release_vm(vm: &mut VirtualMachine) {
    vm.set_host(None);
    vm.set_current_allocated_size(0);
    vm.set_current_allocated_ram(0);
    vm.set_current_allocated_bw(0);
    vm.set_current_allocated_mips(Vec::new());
}

fn migration_error(vm_key: &str, machine_id: u32, resource: &'static str) -> SchedulingError {
    SchedulingError::MigrationAdmission {
        vm: vm_key.to_owned(),
        machine_id,
        resource,
    }
}
