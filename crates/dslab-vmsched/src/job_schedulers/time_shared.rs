//! Time-shared policy: all submitted jobs run at once sharing the VM capacity.

use crate::context::SchedulingContext;
use crate::job::{Job, JobId, JobStatus};
use crate::job_scheduler::{share_capacity, JobQueues, JobScheduler};
use crate::log_debug;
use crate::record::{progress_units, JobExecutionRecord};

/// Runs every job immediately, splitting the VM share evenly between the occupied virtual slots.
///
/// When the jobs require more slots than the VM has, each slot gets a proportionally smaller capacity.
pub struct TimeSharedJobScheduler {
    queues: JobQueues,
    ctx: SchedulingContext,
}

impl TimeSharedJobScheduler {
    pub fn new(ctx: SchedulingContext) -> Self {
        Self {
            queues: JobQueues::new(),
            ctx,
        }
    }

    fn slots_in_use(&self) -> u32 {
        self.queues.exec.iter().map(|record| record.required_slots()).sum()
    }

    /// Returns MIPS available to one occupied virtual slot.
    fn capacity(&self, mips_share: &[f64]) -> f64 {
        capacity_per_slot(mips_share, self.slots_in_use())
    }

    /// Returns the estimated time needed to run the remaining part of the job with the current share.
    pub fn estimated_remaining_time(&self, job_id: JobId) -> Option<f64> {
        let record = self.queues.exec.iter().find(|record| record.job_id() == job_id)?;
        let capacity = self.capacity(&self.queues.current_mips_share) * record.required_slots() as f64;
        let estimate = record.remaining_length() as f64 / capacity;
        Some(if estimate.is_finite() { estimate } else { 0. })
    }
}

impl JobScheduler for TimeSharedJobScheduler {
    fn update_vm_processing(&mut self, current_time: f64, mips_share: &[f64]) -> f64 {
        self.queues.current_mips_share = mips_share.to_vec();
        let time_span = current_time - self.queues.previous_time;
        let capacity = self.capacity(mips_share);
        for record in self.queues.exec.iter_mut() {
            let slots = record.required_slots();
            record.update_finished_so_far(progress_units(capacity, time_span, slots));
        }

        for record in self.queues.drain_completed() {
            log_debug!(self.ctx, "job #{} finished", record.job_id());
            self.queues.finish_at(record, current_time);
        }

        let next_event = if self.queues.exec.is_empty() {
            0.
        } else {
            let capacity = self.capacity(mips_share);
            self.queues.predict_next_event(current_time, self.ctx.min_time_between_events(), |record| {
                capacity * record.required_slots() as f64
            })
        };
        self.queues.previous_time = current_time;
        next_event
    }

    fn submit(&mut self, job: Job, file_transfer_time: f64) -> f64 {
        let time = self.ctx.time();
        let mut record = JobExecutionRecord::new(job, time);
        record.set_status(JobStatus::InExec, time);
        for slot_id in 0..record.required_slots() {
            record.assign_slot(None, slot_id);
        }
        let capacity = capacity_per_slot(
            &self.queues.current_mips_share,
            self.slots_in_use() + record.required_slots(),
        );
        record.extend_length((capacity * file_transfer_time) as u64);
        let length = record.job().length() as f64;
        log_debug!(self.ctx, "job #{} submitted, length {}", record.job_id(), length);
        self.queues.exec.push(record);

        let estimate = length / capacity;
        if estimate.is_finite() {
            estimate
        } else {
            0.
        }
    }

    fn cancel(&mut self, job_id: JobId) -> Option<Job> {
        self.queues.cancel(job_id, self.ctx.time())
    }

    fn pause(&mut self, job_id: JobId) -> bool {
        self.queues.pause(job_id, self.ctx.time())
    }

    fn resume(&mut self, job_id: JobId) -> f64 {
        let time = self.ctx.time();
        let mut record = match self.queues.take_paused(job_id) {
            Some(record) => record,
            None => return 0.,
        };
        record.set_status(JobStatus::Resumed, time);
        let remaining = record.remaining_length() as f64;
        let slots = record.required_slots();
        self.queues.exec.push(record);

        // resumed job gets the share of the slots with non-zero MIPS
        let (capacity, cpus) = share_capacity(&self.queues.current_mips_share);
        let capacity = if cpus > 0 { capacity / cpus as f64 } else { 0. };
        let estimate = remaining / (capacity * slots as f64);
        if estimate.is_finite() {
            time + estimate
        } else {
            0.
        }
    }

    fn finish(&mut self, record: JobExecutionRecord) {
        let time = self.ctx.time();
        self.queues.finish_at(record, time);
    }

    fn current_requested_mips(&self) -> Vec<f64> {
        Vec::new()
    }

    fn queues(&self) -> &JobQueues {
        &self.queues
    }

    fn queues_mut(&mut self) -> &mut JobQueues {
        &mut self.queues
    }
}

/// Divides the share between the occupied virtual slots, or between the non-zero share entries if there are more.
fn capacity_per_slot(mips_share: &[f64], slots_in_use: u32) -> f64 {
    let (capacity, cpus) = share_capacity(mips_share);
    let divisor = slots_in_use.max(cpus);
    if divisor == 0 {
        return 0.;
    }
    capacity / divisor as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;

    #[test]
    fn capacity_is_divided_between_occupied_slots() {
        let env = Environment::new(0.1);
        let mut scheduler = TimeSharedJobScheduler::new(env.create_context("vm"));
        scheduler.update_vm_processing(0., &[1000., 1000.]);
        assert_eq!(scheduler.submit(Job::new(0, 10_000, 2).unwrap(), 0.), 10.);
        scheduler.submit(Job::new(1, 10_000, 2).unwrap(), 0.);
        // two jobs on four virtual slots share two physical ones
        assert_eq!(scheduler.capacity(&[1000., 1000.]), 500.);
        assert_eq!(scheduler.estimated_remaining_time(0), Some(20.));
    }
}
