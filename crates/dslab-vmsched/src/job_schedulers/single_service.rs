//! Policy for VMs running a single long-lived service with variable load.

use std::cell::RefCell;

use crate::context::SchedulingContext;
use crate::job::{Job, JobId, JobStatus};
use crate::job_scheduler::{JobQueues, JobScheduler};
use crate::log_debug;
use crate::record::JobExecutionRecord;
use crate::MILLION;

/// Runs the submitted jobs without queueing, each job consumes the MIPS defined by its CPU utilization model.
///
/// The MIPS requested by the VM follow the utilization of the running jobs, so the machine can give the VM only
/// the capacity which is actually used.
pub struct SingleServiceJobScheduler {
    queues: JobQueues,
    mips: f64,
    slots: u32,
    total_mips: f64,
    requested_mips_cache: RefCell<Option<(f64, Vec<f64>)>>,
    ctx: SchedulingContext,
}

impl SingleServiceJobScheduler {
    /// Creates scheduler for a VM with `slots` virtual slots of `mips` each.
    pub fn new(mips: f64, slots: u32, ctx: SchedulingContext) -> Self {
        Self {
            queues: JobQueues::new(),
            mips,
            slots,
            total_mips: mips * slots as f64,
            requested_mips_cache: RefCell::new(None),
            ctx,
        }
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    pub fn total_mips(&self) -> f64 {
        self.total_mips
    }

    fn allocated_mips(&self, record: &JobExecutionRecord, time: f64) -> f64 {
        let requested = record.job().utilization_of_cpu(time) * self.total_mips;
        let available: f64 = self.queues.current_mips_share.iter().sum();
        requested.min(available)
    }

    fn estimated_finish_time(&self, record: &JobExecutionRecord, time: f64) -> f64 {
        let estimate = record.remaining_length() as f64 / self.allocated_mips(record, time);
        if estimate.is_finite() {
            time + estimate
        } else {
            0.
        }
    }
}

impl JobScheduler for SingleServiceJobScheduler {
    fn update_vm_processing(&mut self, current_time: f64, mips_share: &[f64]) -> f64 {
        self.queues.current_mips_share = mips_share.to_vec();
        let previous_time = self.queues.previous_time;
        let time_span = current_time - previous_time;

        let progress: Vec<u64> = self
            .queues
            .exec
            .iter()
            .map(|record| (time_span * self.allocated_mips(record, previous_time) * MILLION) as u64)
            .collect();
        for (record, units) in self.queues.exec.iter_mut().zip(progress) {
            record.update_finished_so_far(units);
        }
        for record in self.queues.drain_completed() {
            log_debug!(self.ctx, "job #{} finished", record.job_id());
            self.queues.finish_at(record, current_time);
        }

        let min_gap = self.ctx.min_time_between_events();
        let mut next_event = f64::MAX;
        for record in self.queues.exec.iter() {
            let mut estimated_finish_time = self.estimated_finish_time(record, current_time);
            // no MIPS, no prediction
            if estimated_finish_time == 0. {
                continue;
            }
            if estimated_finish_time - current_time < min_gap {
                estimated_finish_time = current_time + min_gap;
            }
            next_event = next_event.min(estimated_finish_time);
        }
        self.queues.previous_time = current_time;
        if self.queues.exec.is_empty() {
            0.
        } else {
            next_event
        }
    }

    fn submit(&mut self, job: Job, _file_transfer_time: f64) -> f64 {
        let time = self.ctx.time();
        let mut record = JobExecutionRecord::new(job, time);
        record.set_status(JobStatus::InExec, time);
        for slot_id in 0..record.required_slots() {
            record.assign_slot(None, slot_id);
        }
        let estimate = self.estimated_finish_time(&record, self.queues.previous_time);
        log_debug!(self.ctx, "job #{} started", record.job_id());
        self.queues.exec.push(record);
        estimate
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
        let estimate = self.estimated_finish_time(&record, time);
        self.queues.exec.push(record);
        estimate
    }

    fn finish(&mut self, record: JobExecutionRecord) {
        let time = self.ctx.time();
        self.queues.finish_at(record, time);
    }

    /// Returns utilization-weighted MIPS evenly divided between the virtual slots.
    fn current_requested_mips(&self) -> Vec<f64> {
        let previous_time = self.queues.previous_time;
        if let Some((time, mips)) = self.requested_mips_cache.borrow().as_ref() {
            if *time == previous_time {
                return mips.clone();
            }
        }
        let total = self.total_utilization_of_cpu(previous_time) * self.total_mips;
        let per_slot = total / self.slots as f64;
        let mips = vec![per_slot; self.slots as usize];
        *self.requested_mips_cache.borrow_mut() = Some((previous_time, mips.clone()));
        mips
    }

    fn total_current_available_mips_for_job(&self, job_id: JobId) -> f64 {
        if self.queues.find(job_id).is_none() {
            return 0.;
        }
        self.queues.current_mips_share.iter().sum()
    }

    fn total_current_requested_mips_for_job(&self, job_id: JobId, time: f64) -> f64 {
        match self.queues.find(job_id) {
            Some(record) => record.job().utilization_of_cpu(time) * self.total_mips,
            None => 0.,
        }
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
    use sugars::boxed;

    use super::*;
    use crate::context::Environment;
    use crate::utilization_model::{ConstantUtilizationModel, FullUtilizationModel};

    #[test]
    fn requested_mips_follow_utilization() {
        let env = Environment::new(0.1);
        let mut scheduler = SingleServiceJobScheduler::new(500., 2, env.create_context("vm"));
        let job = Job::with_utilization_models(
            0,
            3000,
            1,
            boxed!(ConstantUtilizationModel::new(0.3)),
            boxed!(FullUtilizationModel),
            boxed!(FullUtilizationModel),
        )
        .unwrap();
        scheduler.update_vm_processing(0., &[500., 500.]);
        // 0.3 * 1000 MIPS, the job needs 10 seconds
        assert_eq!(scheduler.submit(job, 5.), 10.);
        assert_eq!(scheduler.current_requested_mips(), vec![150., 150.]);
        assert_eq!(scheduler.total_current_allocated_mips_for_job(0, 0.), 300.);

        // share smaller than the demand caps the progress
        env.set_time(4.);
        scheduler.update_vm_processing(4., &[100., 100.]);
        assert_eq!(scheduler.queues().exec[0].remaining_length(), 2200);
    }
}
