//! Allocation of VM capacity to jobs.

use std::collections::VecDeque;

use sugars::boxed;

use crate::config::options::parse_config_value;
use crate::context::SchedulingContext;
use crate::error::SchedulingError;
use crate::job::{Job, JobId, JobStatus};
use crate::job_schedulers::single_service::SingleServiceJobScheduler;
use crate::job_schedulers::space_shared::SpaceSharedJobScheduler;
use crate::job_schedulers::time_shared::TimeSharedJobScheduler;
use crate::record::JobExecutionRecord;

/// Trait for implementation of job scheduling policies inside a VM.
///
/// Scheduler receives the MIPS share granted to the VM on every tick via [`update_vm_processing`] and converts it
/// into progress of the executing jobs. Each job is kept in exactly one of the five queues (waiting, executing,
/// paused, finished, failed).
///
/// [`update_vm_processing`]: JobScheduler::update_vm_processing
pub trait JobScheduler {
    /// Advances executing jobs to `current_time` using the MIPS share granted since the previous update.
    ///
    /// Returns the predicted time of the next job completion or 0 if no job is executing.
    fn update_vm_processing(&mut self, current_time: f64, mips_share: &[f64]) -> f64;

    /// Submits a job. Returns the estimated execution time or 0 if the job was queued.
    fn submit(&mut self, job: Job, file_transfer_time: f64) -> f64;

    /// Removes a job from the scheduler. Returns `None` if the job is unknown.
    fn cancel(&mut self, job_id: JobId) -> Option<Job>;

    /// Pauses an executing or waiting job. Returns `false` if the job is not found.
    fn pause(&mut self, job_id: JobId) -> bool;

    /// Resumes a paused job. Returns the estimated finish time or 0 if the job was queued or not found.
    fn resume(&mut self, job_id: JobId) -> f64;

    /// Completes a job removed from the executing queue.
    fn finish(&mut self, record: JobExecutionRecord);

    /// Returns MIPS per virtual slot requested by the running jobs.
    ///
    /// An empty list means the scheduler has no own demand model and the VM requests its nominal capacity.
    fn current_requested_mips(&self) -> Vec<f64>;

    fn queues(&self) -> &JobQueues;

    fn queues_mut(&mut self) -> &mut JobQueues;

    /// Returns MIPS of the current share which the job can use.
    fn total_current_available_mips_for_job(&self, job_id: JobId) -> f64 {
        let queues = self.queues();
        match queues.find(job_id) {
            Some(record) => queues
                .current_mips_share
                .iter()
                .take(record.required_slots() as usize)
                .sum(),
            None => 0.,
        }
    }

    /// Returns MIPS demanded by the job according to its CPU utilization model.
    fn total_current_requested_mips_for_job(&self, job_id: JobId, time: f64) -> f64 {
        match self.queues().find(job_id) {
            Some(record) => record.job().utilization_of_cpu(time) * self.total_current_available_mips_for_job(job_id),
            None => 0.,
        }
    }

    /// Returns MIPS actually used by the job.
    fn total_current_allocated_mips_for_job(&self, job_id: JobId, time: f64) -> f64 {
        self.total_current_requested_mips_for_job(job_id, time)
            .min(self.total_current_available_mips_for_job(job_id))
    }

    fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.queues().status(job_id)
    }

    fn has_finished_jobs(&self) -> bool {
        !self.queues().finished.is_empty()
    }

    /// Removes and returns the earliest finished job.
    fn take_next_finished_job(&mut self) -> Option<Job> {
        self.queues_mut().finished.pop_front().map(|record| record.into_job())
    }

    fn is_finished_job(&self, job_id: JobId) -> bool {
        self.queues().finished.iter().any(|record| record.job_id() == job_id)
    }

    /// Returns the number of executing jobs.
    fn running_jobs(&self) -> usize {
        self.queues().exec.len()
    }

    /// Returns the summed CPU utilization of the executing jobs.
    fn total_utilization_of_cpu(&self, time: f64) -> f64 {
        self.queues()
            .exec
            .iter()
            .map(|record| record.job().utilization_of_cpu(time))
            .sum()
    }

    fn current_requested_utilization_of_ram(&self, time: f64) -> f64 {
        self.queues()
            .exec
            .iter()
            .map(|record| record.job().utilization_of_ram(time))
            .sum()
    }

    fn current_requested_utilization_of_bw(&self, time: f64) -> f64 {
        self.queues()
            .exec
            .iter()
            .map(|record| record.job().utilization_of_bw(time))
            .sum()
    }

    fn previous_time(&self) -> f64 {
        self.queues().previous_time
    }

    fn current_mips_share(&self) -> &[f64] {
        &self.queues().current_mips_share
    }
}

/// Queues and timing state shared by all job scheduling policies.
#[derive(Default)]
pub struct JobQueues {
    pub waiting: Vec<JobExecutionRecord>,
    pub exec: Vec<JobExecutionRecord>,
    pub paused: Vec<JobExecutionRecord>,
    pub finished: VecDeque<JobExecutionRecord>,
    pub failed: Vec<JobExecutionRecord>,
    pub previous_time: f64,
    pub current_mips_share: Vec<f64>,
}

impl JobQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for the job in all queues.
    pub fn find(&self, job_id: JobId) -> Option<&JobExecutionRecord> {
        self.exec
            .iter()
            .chain(self.paused.iter())
            .chain(self.waiting.iter())
            .chain(self.finished.iter())
            .chain(self.failed.iter())
            .find(|record| record.job_id() == job_id)
    }

    pub fn status(&self, job_id: JobId) -> Option<JobStatus> {
        self.find(job_id).map(|record| record.status())
    }

    /// Marks the job as successful, stores its results and appends it to the finished queue.
    pub fn finish_at(&mut self, mut record: JobExecutionRecord, time: f64) {
        record.set_status(JobStatus::Success, time);
        record.finalize(time);
        self.finished.push_back(record);
    }

    /// Removes the job from the finished queue.
    pub fn take_finished(&mut self, job_id: JobId) -> Option<JobExecutionRecord> {
        let pos = self.finished.iter().position(|record| record.job_id() == job_id)?;
        self.finished.remove(pos)
    }

    /// Cancels the job and returns it with the partial progress stored.
    ///
    /// An executing job with no remaining length is completed successfully instead. Finished jobs are returned as is.
    pub fn cancel(&mut self, job_id: JobId, time: f64) -> Option<Job> {
        if let Some(record) = self.take_finished(job_id) {
            return Some(record.into_job());
        }
        let mut record = if let Some(pos) = self.exec.iter().position(|record| record.job_id() == job_id) {
            let record = self.exec.remove(pos);
            if record.remaining_length() == 0 {
                self.finish_at(record, time);
                return self.take_finished(job_id).map(|record| record.into_job());
            }
            record
        } else if let Some(pos) = self.paused.iter().position(|record| record.job_id() == job_id) {
            self.paused.remove(pos)
        } else if let Some(pos) = self.waiting.iter().position(|record| record.job_id() == job_id) {
            self.waiting.remove(pos)
        } else {
            return None;
        };
        record.set_status(JobStatus::Canceled, time);
        record.finalize(time);
        Some(record.into_job())
    }

    /// Moves the executing or waiting job to the paused queue.
    pub fn pause(&mut self, job_id: JobId, time: f64) -> bool {
        let mut record = if let Some(pos) = self.exec.iter().position(|record| record.job_id() == job_id) {
            self.exec.remove(pos)
        } else if let Some(pos) = self.waiting.iter().position(|record| record.job_id() == job_id) {
            self.waiting.remove(pos)
        } else {
            return false;
        };
        if record.remaining_length() == 0 {
            self.finish_at(record, time);
        } else {
            record.set_status(JobStatus::Paused, time);
            self.paused.push(record);
        }
        true
    }

    /// Removes the job from the paused queue.
    pub fn take_paused(&mut self, job_id: JobId) -> Option<JobExecutionRecord> {
        let pos = self.paused.iter().position(|record| record.job_id() == job_id)?;
        Some(self.paused.remove(pos))
    }

    /// Removes the executing jobs with no remaining length, keeps the order of the others.
    pub fn drain_completed(&mut self) -> Vec<JobExecutionRecord> {
        let (completed, running): (Vec<_>, Vec<_>) = self
            .exec
            .drain(..)
            .partition(|record| record.remaining_length() == 0);
        self.exec = running;
        completed
    }

    /// Returns the earliest predicted completion among executing jobs.
    ///
    /// `mips_for` gives the MIPS available to one virtual slot of the job. Predictions closer to `current_time` than
    /// `min_gap` are moved to `current_time + min_gap`.
    pub fn predict_next_event<F>(&self, current_time: f64, min_gap: f64, mips_for: F) -> f64
    where
        F: Fn(&JobExecutionRecord) -> f64,
    {
        let mut next_event = f64::MAX;
        for record in self.exec.iter() {
            let mut estimated_finish_time = current_time + record.remaining_length() as f64 / mips_for(record);
            if estimated_finish_time - current_time < min_gap {
                estimated_finish_time = current_time + min_gap;
            }
            if estimated_finish_time < next_event {
                next_event = estimated_finish_time;
            }
        }
        next_event
    }
}

/// Splits a MIPS share into its sum and the number of non-zero entries.
pub fn share_capacity(mips_share: &[f64]) -> (f64, u32) {
    let mut capacity = 0.;
    let mut cpus = 0;
    for mips in mips_share {
        capacity += mips;
        if *mips > 0. {
            cpus += 1;
        }
    }
    (capacity, cpus)
}

/// Creates job scheduler from config value string.
///
/// `mips` and `slots` describe the VM capacity, they are used by the single service policy.
pub fn job_scheduler_resolver(
    config_str: &str,
    ctx: SchedulingContext,
    mips: f64,
    slots: u32,
) -> Result<Box<dyn JobScheduler>, SchedulingError> {
    let (name, _) = parse_config_value(config_str);
    match name.as_str() {
        "TimeShared" => Ok(boxed!(TimeSharedJobScheduler::new(ctx))),
        "SpaceShared" => Ok(boxed!(SpaceSharedJobScheduler::new(ctx))),
        "SingleServiceWorkload" | "DynamicWorkload" => Ok(boxed!(SingleServiceJobScheduler::new(mips, slots, ctx))),
        _ => Err(SchedulingError::Config(format!("can't resolve job scheduler: {}", config_str))),
    }
}
