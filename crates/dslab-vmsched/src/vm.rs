//! Representation of virtual machine.

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::job::{Job, JobId, JobStatus};
use crate::job_scheduler::JobScheduler;

/// Returns the unique key of VM owned by the user.
pub fn vm_key(user_id: u32, vm_id: u32) -> String {
    format!("{}-{}", user_id, vm_id)
}

/// Utilization of VM at some moment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmStateHistoryEntry {
    pub time: f64,
    pub allocated_mips: f64,
    pub requested_mips: f64,
    pub is_in_migration: bool,
}

/// Represents virtual machine (VM).
///
/// VM requests `slots` virtual slots of `mips` each plus RAM, bandwidth and storage from the machine it is placed on.
/// Jobs submitted to VM are managed by its job scheduler, which converts the MIPS share given by the machine into
/// job progress. The hosting machine is referenced by its id only.
pub struct VirtualMachine {
    pub id: u32,
    pub user_id: u32,
    key: String,
    mips: f64,
    slots: u32,
    ram: u64,
    bw: u64,
    size: u64,
    vmm: String,
    job_scheduler: Box<dyn JobScheduler>,
    host: Option<u32>,
    in_migration: bool,
    being_instantiated: bool,
    current_allocated_size: u64,
    current_allocated_ram: u64,
    current_allocated_bw: u64,
    current_allocated_mips: Vec<f64>,
    state_history: Vec<VmStateHistoryEntry>,
}

impl Serialize for VirtualMachine {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("VirtualMachine", 7)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("mips", &self.mips)?;
        state.serialize_field("slots", &self.slots)?;
        state.serialize_field("ram", &self.ram)?;
        state.serialize_field("bw", &self.bw)?;
        state.serialize_field("host", &self.host)?;
        state.serialize_field("state_history", &self.state_history)?;
        state.end()
    }
}

impl VirtualMachine {
    /// Creates virtual machine with specified parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        user_id: u32,
        mips: f64,
        slots: u32,
        ram: u64,
        bw: u64,
        size: u64,
        vmm: &str,
        job_scheduler: Box<dyn JobScheduler>,
    ) -> Self {
        Self {
            id,
            user_id,
            key: vm_key(user_id, id),
            mips,
            slots,
            ram,
            bw,
            size,
            vmm: vmm.to_owned(),
            job_scheduler,
            host: None,
            in_migration: false,
            being_instantiated: true,
            current_allocated_size: 0,
            current_allocated_ram: 0,
            current_allocated_bw: 0,
            current_allocated_mips: Vec::new(),
            state_history: Vec::new(),
        }
    }

    /// Returns the unique key of VM.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns MIPS of one virtual slot.
    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    pub fn ram(&self) -> u64 {
        self.ram
    }

    pub fn bw(&self) -> u64 {
        self.bw
    }

    /// Returns storage footprint of VM image.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn vmm(&self) -> &str {
        &self.vmm
    }

    /// Returns the id of the machine hosting VM.
    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub fn set_host(&mut self, host: Option<u32>) {
        self.host = host;
    }

    pub fn is_in_migration(&self) -> bool {
        self.in_migration
    }

    pub fn set_in_migration(&mut self, in_migration: bool) {
        self.in_migration = in_migration;
    }

    pub fn is_being_instantiated(&self) -> bool {
        self.being_instantiated
    }

    pub fn set_being_instantiated(&mut self, being_instantiated: bool) {
        self.being_instantiated = being_instantiated;
    }

    pub fn job_scheduler(&self) -> &dyn JobScheduler {
        self.job_scheduler.as_ref()
    }

    pub fn job_scheduler_mut(&mut self) -> &mut dyn JobScheduler {
        self.job_scheduler.as_mut()
    }

    /// Passes the MIPS share allocated by the machine to the job scheduler.
    ///
    /// VM without allocation gets an empty share, so its jobs make no progress until the next allocation.
    ///
    /// Returns the predicted time of the next job completion or 0 if there is no running job.
    pub fn update_processing(&mut self, time: f64, mips_share: Option<&[f64]>) -> f64 {
        self.job_scheduler.update_vm_processing(time, mips_share.unwrap_or(&[]))
    }

    /// Returns MIPS requested for each virtual slot.
    ///
    /// VM which is being instantiated or has a scheduler without own demand model requests its nominal capacity.
    pub fn current_requested_mips(&self) -> Vec<f64> {
        if self.being_instantiated {
            return vec![self.mips; self.slots as usize];
        }
        let requested = self.job_scheduler.current_requested_mips();
        if requested.is_empty() {
            vec![self.mips; self.slots as usize]
        } else {
            requested
        }
    }

    pub fn current_requested_total_mips(&self) -> f64 {
        self.current_requested_mips().iter().sum()
    }

    pub fn current_requested_max_mips(&self) -> f64 {
        self.current_requested_mips().iter().copied().fold(0., f64::max)
    }

    pub fn current_requested_ram(&self) -> u64 {
        if self.being_instantiated {
            return self.ram;
        }
        let time = self.job_scheduler.previous_time();
        (self.job_scheduler.current_requested_utilization_of_ram(time) * self.ram as f64) as u64
    }

    pub fn current_requested_bw(&self) -> u64 {
        if self.being_instantiated {
            return self.bw;
        }
        let time = self.job_scheduler.previous_time();
        (self.job_scheduler.current_requested_utilization_of_bw(time) * self.bw as f64) as u64
    }

    /// Returns the summed CPU utilization of the running jobs.
    pub fn total_utilization_of_cpu(&self, time: f64) -> f64 {
        self.job_scheduler.total_utilization_of_cpu(time)
    }

    /// Returns the CPU utilization in MIPS.
    pub fn total_utilization_of_cpu_mips(&self, time: f64) -> f64 {
        self.total_utilization_of_cpu(time) * self.mips
    }

    pub fn current_allocated_size(&self) -> u64 {
        self.current_allocated_size
    }

    pub fn set_current_allocated_size(&mut self, size: u64) {
        self.current_allocated_size = size;
    }

    pub fn current_allocated_ram(&self) -> u64 {
        self.current_allocated_ram
    }

    pub fn set_current_allocated_ram(&mut self, ram: u64) {
        self.current_allocated_ram = ram;
    }

    pub fn current_allocated_bw(&self) -> u64 {
        self.current_allocated_bw
    }

    pub fn set_current_allocated_bw(&mut self, bw: u64) {
        self.current_allocated_bw = bw;
    }

    pub fn current_allocated_mips(&self) -> &[f64] {
        &self.current_allocated_mips
    }

    pub fn set_current_allocated_mips(&mut self, mips: Vec<f64>) {
        self.current_allocated_mips = mips;
    }

    /// Appends an entry to the utilization history, replacing the last one if it has the same time.
    pub fn add_state_history_entry(
        &mut self,
        time: f64,
        allocated_mips: f64,
        requested_mips: f64,
        is_in_migration: bool,
    ) {
        let entry = VmStateHistoryEntry {
            time,
            allocated_mips,
            requested_mips,
            is_in_migration,
        };
        match self.state_history.last_mut() {
            Some(last) if last.time == time => *last = entry,
            _ => self.state_history.push(entry),
        }
    }

    pub fn state_history(&self) -> &[VmStateHistoryEntry] {
        &self.state_history
    }

    /// Submits job to the job scheduler, see [`JobScheduler::submit`].
    pub fn submit_job(&mut self, mut job: Job, file_transfer_time: f64) -> f64 {
        job.set_vm_id(self.id);
        self.job_scheduler.submit(job, file_transfer_time)
    }

    pub fn cancel_job(&mut self, job_id: JobId) -> Option<Job> {
        self.job_scheduler.cancel(job_id)
    }

    pub fn pause_job(&mut self, job_id: JobId) -> bool {
        self.job_scheduler.pause(job_id)
    }

    pub fn resume_job(&mut self, job_id: JobId) -> f64 {
        self.job_scheduler.resume(job_id)
    }

    pub fn job_status(&self, job_id: JobId) -> Option<JobStatus> {
        self.job_scheduler.status(job_id)
    }

    pub fn has_finished_jobs(&self) -> bool {
        self.job_scheduler.has_finished_jobs()
    }

    pub fn take_next_finished_job(&mut self) -> Option<Job> {
        self.job_scheduler.take_next_finished_job()
    }

    pub fn running_jobs(&self) -> usize {
        self.job_scheduler.running_jobs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use crate::job_schedulers::time_shared::TimeSharedJobScheduler;

    #[test]
    fn requests_nominal_capacity_while_instantiated() {
        let env = Environment::new(0.1);
        let scheduler = Box::new(TimeSharedJobScheduler::new(env.create_context("vm")));
        let mut vm = VirtualMachine::new(3, 1, 250., 2, 512, 100, 1000, "Xen", scheduler);
        assert_eq!(vm.key(), "1-3");
        assert_eq!(vm.current_requested_ram(), 512);
        assert_eq!(vm.current_requested_max_mips(), 250.);
        vm.set_being_instantiated(false);
        // no running jobs, RAM demand follows the utilization models
        assert_eq!(vm.current_requested_ram(), 0);
        assert_eq!(vm.current_requested_total_mips(), 500.);
    }

    #[test]
    fn history_entries_with_equal_time_are_coalesced() {
        let env = Environment::new(0.1);
        let scheduler = Box::new(TimeSharedJobScheduler::new(env.create_context("vm")));
        let mut vm = VirtualMachine::new(0, 0, 100., 1, 1, 1, 1, "Xen", scheduler);
        vm.add_state_history_entry(1., 50., 100., false);
        vm.add_state_history_entry(1., 80., 100., false);
        vm.add_state_history_entry(2., 90., 100., true);
        assert_eq!(vm.state_history().len(), 2);
        assert_eq!(vm.state_history()[0].allocated_mips, 80.);
    }
}
