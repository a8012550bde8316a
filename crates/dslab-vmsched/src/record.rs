//! Scheduling-time state of a job.

use crate::job::{Job, JobId, JobStatus};
use crate::MILLION;

/// Wraps a job while it is known to a job scheduler.
///
/// Progress is kept in instruction units (MI × 10^6), the total length is fixed when the record is created
/// (and extended only by the file transfer allowance), so later changes of the job length field do not affect
/// the remaining work.
pub struct JobExecutionRecord {
    job: Job,
    arrival_time: f64,
    start_exec_time: f64,
    total_completion_time: f64,
    total_length: u64,
    finished_so_far: u64,
    machine_id: Option<u32>,
    slot_ids: Vec<u32>,
}

impl JobExecutionRecord {
    /// Creates record for a job arriving at the specified time.
    ///
    /// Progress already recorded in the job is carried over.
    pub fn new(mut job: Job, time: f64) -> Self {
        job.set_submission_time(time);
        let finished_so_far = job.finished_so_far().saturating_mul(MILLION as u64);
        Self {
            total_length: job.total_length(),
            job,
            arrival_time: time,
            start_exec_time: 0.,
            total_completion_time: 0.,
            finished_so_far,
            machine_id: None,
            slot_ids: Vec::new(),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn job_mut(&mut self) -> &mut Job {
        &mut self.job
    }

    pub fn into_job(self) -> Job {
        self.job
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }

    pub fn required_slots(&self) -> u32 {
        self.job.required_slots()
    }

    pub fn status(&self) -> JobStatus {
        self.job.status()
    }

    pub fn arrival_time(&self) -> f64 {
        self.arrival_time
    }

    pub fn start_exec_time(&self) -> f64 {
        self.start_exec_time
    }

    /// Returns the time spent in execution, accumulated over pauses.
    pub fn total_completion_time(&self) -> f64 {
        self.total_completion_time
    }

    /// Returns the total length in MI over all required slots.
    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Returns the progress in instruction units.
    pub fn finished_so_far(&self) -> u64 {
        self.finished_so_far
    }

    /// Changes the status of the job and updates execution time accounting.
    ///
    /// Returns `false` if the job already has this status.
    pub fn set_status(&mut self, status: JobStatus, time: f64) -> bool {
        let prev_status = self.job.status();
        if prev_status == status {
            return false;
        }
        self.job.set_status(status, time);

        let stops_execution = matches!(status, JobStatus::Canceled | JobStatus::Paused | JobStatus::Success);
        if (prev_status == JobStatus::InExec && stops_execution)
            || (prev_status == JobStatus::Resumed && status == JobStatus::Success)
        {
            self.total_completion_time += time - self.start_exec_time;
            return true;
        }
        if status == JobStatus::InExec || (prev_status == JobStatus::Paused && status == JobStatus::Resumed) {
            self.start_exec_time = time;
            self.job.set_exec_start_time(time);
        }
        true
    }

    /// Adds progress in instruction units.
    pub fn update_finished_so_far(&mut self, units: u64) {
        self.finished_so_far = self.finished_so_far.saturating_add(units);
    }

    /// Returns the remaining length in whole MI.
    pub fn remaining_length(&self) -> u64 {
        let total_units = self.total_length.saturating_mul(MILLION as u64);
        total_units.saturating_sub(self.finished_so_far) / MILLION as u64
    }

    /// Extends the job by the specified MI, e.g. to account for input file transfer.
    pub fn extend_length(&mut self, extra: u64) {
        if extra == 0 {
            return;
        }
        self.job.set_length(self.job.length() + extra);
        self.total_length += extra * self.job.required_slots() as u64;
    }

    /// Remembers the physical slot assigned to one of the job virtual slots.
    pub fn assign_slot(&mut self, machine_id: Option<u32>, slot_id: u32) {
        self.machine_id = machine_id;
        self.slot_ids.push(slot_id);
    }

    pub fn slot_ids(&self) -> &[u32] {
        &self.slot_ids
    }

    pub fn machine_id(&self) -> Option<u32> {
        self.machine_id
    }

    /// Stores execution results in the job.
    ///
    /// Successful jobs report their full length, other jobs the progress made so far.
    pub fn finalize(&mut self, time: f64) {
        let wall_clock_time = time - self.arrival_time;
        self.job.set_exec_param(wall_clock_time, self.total_completion_time);
        let finished = if self.job.status() == JobStatus::Success {
            self.job.length()
        } else {
            self.finished_so_far / MILLION as u64
        };
        self.job.set_finished_so_far(finished);
    }
}

/// Converts MIPS granted for the elapsed time into instruction units of progress.
pub fn progress_units(mips_per_slot: f64, time_span: f64, slots: u32) -> u64 {
    (mips_per_slot * time_span * slots as f64 * MILLION) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_time_accumulates_over_pauses() {
        let mut job = Job::new(0, 1000, 1).unwrap();
        job.set_machine_parameter(0, "m0", 1.);
        let mut record = JobExecutionRecord::new(job, 0.);
        record.set_status(JobStatus::InExec, 1.);
        record.set_status(JobStatus::Paused, 3.);
        record.set_status(JobStatus::InExec, 10.);
        assert!(!record.set_status(JobStatus::InExec, 11.));
        record.set_status(JobStatus::Success, 14.);
        assert_eq!(record.total_completion_time(), 6.);
        record.finalize(14.);
        assert_eq!(record.job().wall_clock_time(), 14.);
        assert_eq!(record.job().actual_cpu_time(), 6.);
        assert_eq!(record.job().finished_so_far(), 1000);
        assert_eq!(record.job().finish_time(), Some(14.));
    }

    #[test]
    fn remaining_length_is_floored_and_clamped() {
        let job = Job::new(0, 10, 2).unwrap();
        let mut record = JobExecutionRecord::new(job, 0.);
        assert_eq!(record.remaining_length(), 20);
        record.update_finished_so_far(progress_units(1., 1.5, 2));
        assert_eq!(record.remaining_length(), 17);
        record.update_finished_so_far(progress_units(100., 1., 2));
        assert_eq!(record.remaining_length(), 0);
    }

    #[test]
    fn carried_over_progress_saturates() {
        let mut job = Job::new(0, u64::MAX / 1000, 1).unwrap();
        job.set_finished_so_far(u64::MAX / 1000);
        let record = JobExecutionRecord::new(job, 0.);
        assert_eq!(record.finished_so_far(), u64::MAX);
        assert_eq!(record.remaining_length(), 0);
    }

    #[test]
    fn canceled_job_keeps_partial_progress() {
        let job = Job::new(0, 10, 1).unwrap();
        let mut record = JobExecutionRecord::new(job, 2.);
        record.set_status(JobStatus::InExec, 2.);
        record.update_finished_so_far(progress_units(1., 4., 1));
        record.set_status(JobStatus::Canceled, 6.);
        record.finalize(6.);
        assert_eq!(record.job().finished_so_far(), 4);
        assert_eq!(record.total_completion_time(), 4.);
    }
}
