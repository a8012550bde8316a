//! Space-shared policy: jobs own whole virtual slots, excess jobs wait in a FIFO queue.

use crate::context::SchedulingContext;
use crate::job::{Job, JobId, JobStatus};
use crate::job_scheduler::{share_capacity, JobQueues, JobScheduler};
use crate::record::{progress_units, JobExecutionRecord};
use crate::{log_debug, log_trace};

/// Runs a job only when the VM has enough free virtual slots for it.
///
/// Every slot vacated by a finished, paused or canceled job allows one admission pass over the waiting queue on the
/// next update. Each pass starts the first waiting job (in submission order) which fits into the free slots.
pub struct SpaceSharedJobScheduler {
    queues: JobQueues,
    current_slots: u32,
    used_slots: u32,
    vacated: u32,
    ctx: SchedulingContext,
}

impl SpaceSharedJobScheduler {
    pub fn new(ctx: SchedulingContext) -> Self {
        Self {
            queues: JobQueues::new(),
            current_slots: 0,
            used_slots: 0,
            vacated: 0,
            ctx,
        }
    }

    /// Returns the number of virtual slots not occupied by executing jobs.
    pub fn free_slots(&self) -> u32 {
        self.current_slots.saturating_sub(self.used_slots)
    }

    pub fn used_slots(&self) -> u32 {
        self.used_slots
    }

    /// Returns MIPS of one virtual slot of the current share.
    fn capacity(&self) -> f64 {
        let (capacity, cpus) = share_capacity(&self.queues.current_mips_share);
        if cpus == 0 {
            return 0.;
        }
        capacity / cpus as f64
    }

    fn start(&mut self, mut record: JobExecutionRecord, time: f64) {
        record.set_status(JobStatus::InExec, time);
        for slot_id in 0..record.required_slots() {
            record.assign_slot(None, slot_id);
        }
        self.used_slots += record.required_slots();
        self.queues.exec.push(record);
    }

    fn release(&mut self, slots: u32) {
        self.used_slots = self.used_slots.saturating_sub(slots);
        self.vacated += 1;
    }

    fn executing_slots(&self, job_id: JobId) -> Option<u32> {
        self.queues
            .exec
            .iter()
            .find(|record| record.job_id() == job_id)
            .map(|record| record.required_slots())
    }

    /// Starts waiting jobs, one pass per vacated slot group.
    fn admit_waiting(&mut self, time: f64) {
        for _ in 0..self.vacated {
            let free = self.free_slots();
            let pos = match self.queues.waiting.iter().position(|record| record.required_slots() <= free) {
                Some(pos) => pos,
                None => break,
            };
            let record = self.queues.waiting.remove(pos);
            log_trace!(self.ctx, "job #{} admitted from queue", record.job_id());
            self.start(record, time);
        }
        self.vacated = 0;
    }
}

impl JobScheduler for SpaceSharedJobScheduler {
    fn update_vm_processing(&mut self, current_time: f64, mips_share: &[f64]) -> f64 {
        self.queues.current_mips_share = mips_share.to_vec();
        self.current_slots = share_capacity(mips_share).1;
        let time_span = current_time - self.queues.previous_time;
        let capacity = self.capacity();
        for record in self.queues.exec.iter_mut() {
            let slots = record.required_slots();
            record.update_finished_so_far(progress_units(capacity, time_span, slots));
        }

        if self.queues.exec.is_empty() && self.queues.waiting.is_empty() {
            self.vacated = 0;
            self.queues.previous_time = current_time;
            return 0.;
        }

        for record in self.queues.drain_completed() {
            log_debug!(self.ctx, "job #{} finished", record.job_id());
            self.release(record.required_slots());
            self.queues.finish_at(record, current_time);
        }
        self.admit_waiting(current_time);

        let next_event = if self.queues.exec.is_empty() {
            0.
        } else {
            self.queues.predict_next_event(current_time, self.ctx.min_time_between_events(), |record| {
                capacity * record.required_slots() as f64
            })
        };
        self.queues.previous_time = current_time;
        next_event
    }

    fn submit(&mut self, job: Job, file_transfer_time: f64) -> f64 {
        let time = self.ctx.time();
        self.current_slots = share_capacity(&self.queues.current_mips_share).1;
        let mut record = JobExecutionRecord::new(job, time);
        if self.free_slots() < record.required_slots() {
            log_debug!(self.ctx, "job #{} queued", record.job_id());
            record.set_status(JobStatus::Queued, time);
            self.queues.waiting.push(record);
            return 0.;
        }

        let capacity = self.capacity();
        record.extend_length((capacity * file_transfer_time) as u64);
        let length = record.job().length() as f64;
        log_debug!(self.ctx, "job #{} started, length {}", record.job_id(), length);
        self.start(record, time);

        let estimate = length / capacity;
        if estimate.is_finite() {
            estimate
        } else {
            0.
        }
    }

    fn cancel(&mut self, job_id: JobId) -> Option<Job> {
        let time = self.ctx.time();
        if let Some(slots) = self.executing_slots(job_id) {
            self.release(slots);
        }
        self.queues.cancel(job_id, time)
    }

    fn pause(&mut self, job_id: JobId) -> bool {
        let time = self.ctx.time();
        if let Some(slots) = self.executing_slots(job_id) {
            self.release(slots);
        }
        self.queues.pause(job_id, time)
    }

    fn resume(&mut self, job_id: JobId) -> f64 {
        let time = self.ctx.time();
        let mut record = match self.queues.take_paused(job_id) {
            Some(record) => record,
            None => return 0.,
        };
        let slots = record.required_slots();
        let retargeted = record.remaining_length() * slots as u64;
        record.job_mut().set_length(retargeted.max(1));

        if self.free_slots() < slots {
            record.set_status(JobStatus::Queued, time);
            self.queues.waiting.push(record);
            return 0.;
        }
        let remaining = record.remaining_length() as f64;
        self.start(record, time);
        let estimate = remaining / (self.capacity() * slots as f64);
        if estimate.is_finite() {
            time + estimate
        } else {
            0.
        }
    }

    fn finish(&mut self, record: JobExecutionRecord) {
        let time = self.ctx.time();
        self.release(record.required_slots());
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;

    #[test]
    fn pause_frees_slots_for_waiting_job() {
        let env = Environment::new(0.1);
        let mut scheduler = SpaceSharedJobScheduler::new(env.create_context("vm"));
        scheduler.update_vm_processing(0., &[100.]);
        assert_eq!(scheduler.submit(Job::new(0, 1000, 1).unwrap(), 0.), 10.);
        assert_eq!(scheduler.submit(Job::new(1, 1000, 1).unwrap(), 0.), 0.);

        env.set_time(2.);
        scheduler.update_vm_processing(2., &[100.]);
        assert!(scheduler.pause(0));
        assert_eq!(scheduler.free_slots(), 1);
        assert_eq!(scheduler.status(1), Some(JobStatus::Queued));

        env.set_time(3.);
        scheduler.update_vm_processing(3., &[100.]);
        assert_eq!(scheduler.status(1), Some(JobStatus::InExec));
        assert_eq!(scheduler.free_slots(), 0);

        // no free slot, the resumed job goes to the queue with the remaining length
        assert_eq!(scheduler.resume(0), 0.);
        assert_eq!(scheduler.status(0), Some(JobStatus::Queued));
        assert_eq!(scheduler.queues().waiting[0].job().length(), 800);
    }
}
