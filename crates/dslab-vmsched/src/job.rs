//! Representation of a job (unit of work) and its status.

use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use sugars::boxed;

use crate::error::SchedulingError;
use crate::utilization_model::{FullUtilizationModel, UtilizationModel};

pub type JobId = u64;

/// Status of job.
///
/// `Success`, `Failed`, `Canceled` and `FailedResourceUnavailable` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    Created,
    Ready,
    Queued,
    InExec,
    Success,
    Failed,
    Canceled,
    Paused,
    Resumed,
    FailedResourceUnavailable,
}

impl JobStatus {
    /// Returns numeric status code.
    pub fn code(&self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Ready => 1,
            JobStatus::Queued => 2,
            JobStatus::InExec => 3,
            JobStatus::Success => 4,
            JobStatus::Failed => 5,
            JobStatus::Canceled => 6,
            JobStatus::Paused => 7,
            JobStatus::Resumed => 8,
            JobStatus::FailedResourceUnavailable => 9,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled | JobStatus::FailedResourceUnavailable
        )
    }
}

impl TryFrom<u8> for JobStatus {
    type Error = SchedulingError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(JobStatus::Created),
            1 => Ok(JobStatus::Ready),
            2 => Ok(JobStatus::Queued),
            3 => Ok(JobStatus::InExec),
            4 => Ok(JobStatus::Success),
            5 => Ok(JobStatus::Failed),
            6 => Ok(JobStatus::Canceled),
            7 => Ok(JobStatus::Paused),
            8 => Ok(JobStatus::Resumed),
            9 => Ok(JobStatus::FailedResourceUnavailable),
            _ => Err(SchedulingError::InvalidJobStatus(code)),
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            JobStatus::Created => write!(f, "created"),
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::InExec => write!(f, "in_exec"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Canceled => write!(f, "canceled"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Resumed => write!(f, "resumed"),
            JobStatus::FailedResourceUnavailable => write!(f, "failed_resource_unavailable"),
        }
    }
}

/// Execution of a job on one machine.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionEntry {
    pub machine_id: u32,
    pub machine_name: String,
    pub submission_time: f64,
    pub wall_clock_time: f64,
    pub actual_cpu_time: f64,
    pub cost_per_sec: f64,
    /// Finished length in MI.
    pub finished_so_far: u64,
}

/// Represents a job: a computation of the specified length (in MI) running on one or more virtual slots.
///
/// Jobs are moved between schedulers by value, so the job always has exactly one owner. The machine a job is submitted
/// to appends an execution entry, which collects timing and cost of that execution.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    user_id: u32,
    length: u64,
    required_slots: u32,
    file_size: u64,
    output_size: u64,
    status: JobStatus,
    exec_start_time: f64,
    finish_time: Option<f64>,
    finished_so_far: u64,
    vm_id: Option<u32>,
    cpu_model: Box<dyn UtilizationModel>,
    ram_model: Box<dyn UtilizationModel>,
    bw_model: Box<dyn UtilizationModel>,
    executions: Vec<ExecutionEntry>,
    history: Option<Vec<String>>,
}

impl Serialize for Job {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Job", 9)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("user_id", &self.user_id)?;
        state.serialize_field("length", &self.length)?;
        state.serialize_field("required_slots", &self.required_slots)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("exec_start_time", &self.exec_start_time)?;
        state.serialize_field("finish_time", &self.finish_time)?;
        state.serialize_field("finished_so_far", &self.finished_so_far())?;
        state.serialize_field("executions", &self.executions)?;
        state.end()
    }
}

impl Job {
    /// Creates job which fully uses CPU, RAM and bandwidth of the VM.
    pub fn new(id: JobId, length: u64, required_slots: u32) -> Result<Self, SchedulingError> {
        Self::with_utilization_models(
            id,
            length,
            required_slots,
            boxed!(FullUtilizationModel),
            boxed!(FullUtilizationModel),
            boxed!(FullUtilizationModel),
        )
    }

    /// Creates job with specified utilization models.
    pub fn with_utilization_models(
        id: JobId,
        length: u64,
        required_slots: u32,
        cpu_model: Box<dyn UtilizationModel>,
        ram_model: Box<dyn UtilizationModel>,
        bw_model: Box<dyn UtilizationModel>,
    ) -> Result<Self, SchedulingError> {
        if length < 1 {
            return Err(SchedulingError::InvalidJob {
                job_id: id,
                reason: "length must be at least 1 MI".to_string(),
            });
        }
        if required_slots < 1 {
            return Err(SchedulingError::InvalidJob {
                job_id: id,
                reason: "at least one slot is required".to_string(),
            });
        }
        Ok(Self {
            id,
            user_id: 0,
            length,
            required_slots,
            file_size: 0,
            output_size: 0,
            status: JobStatus::Created,
            exec_start_time: 0.,
            finish_time: None,
            finished_so_far: 0,
            vm_id: None,
            cpu_model,
            ram_model,
            bw_model,
            executions: Vec::new(),
            history: None,
        })
    }

    /// Sets the owner of the job.
    pub fn with_user(mut self, user_id: u32) -> Self {
        self.user_id = user_id;
        self
    }

    /// Sets input and output file sizes.
    pub fn with_file_sizes(mut self, file_size: u64, output_size: u64) -> Self {
        self.file_size = file_size;
        self.output_size = output_size;
        self
    }

    /// Enables recording of the textual history of status changes.
    pub fn with_history(mut self) -> Self {
        self.history = Some(Vec::new());
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Returns job length in MI.
    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    /// Returns length summed over all required slots.
    pub fn total_length(&self) -> u64 {
        self.length * self.required_slots as u64
    }

    pub fn required_slots(&self) -> u32 {
        self.required_slots
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn output_size(&self) -> u64 {
        self.output_size
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Changes job status. Moving to `Success` stamps the finish time.
    pub fn set_status(&mut self, status: JobStatus, time: f64) {
        if status == JobStatus::Success {
            self.finish_time = Some(time);
        }
        self.write(time, format!("status changed from {} to {}", self.status, status));
        self.status = status;
    }

    /// Changes job status by its numeric code.
    pub fn set_status_code(&mut self, code: u8, time: f64) -> Result<(), SchedulingError> {
        let status = JobStatus::try_from(code)?;
        self.set_status(status, time);
        Ok(())
    }

    pub fn exec_start_time(&self) -> f64 {
        self.exec_start_time
    }

    pub fn set_exec_start_time(&mut self, time: f64) {
        self.exec_start_time = time;
        self.write(time, "execution started".to_string());
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn vm_id(&self) -> Option<u32> {
        self.vm_id
    }

    pub fn set_vm_id(&mut self, vm_id: u32) {
        self.vm_id = Some(vm_id);
    }

    /// Opens a new execution entry for the machine the job is submitted to.
    pub fn set_machine_parameter(&mut self, machine_id: u32, machine_name: &str, cost_per_sec: f64) {
        self.executions.push(ExecutionEntry {
            machine_id,
            machine_name: machine_name.to_owned(),
            submission_time: 0.,
            wall_clock_time: 0.,
            actual_cpu_time: 0.,
            cost_per_sec,
            finished_so_far: 0,
        });
    }

    pub fn set_submission_time(&mut self, time: f64) {
        if let Some(entry) = self.executions.last_mut() {
            entry.submission_time = time;
        }
        self.write(time, "submitted".to_string());
    }

    /// Stores wall clock and actual CPU time of the current execution.
    pub fn set_exec_param(&mut self, wall_clock_time: f64, actual_cpu_time: f64) {
        if let Some(entry) = self.executions.last_mut() {
            entry.wall_clock_time = wall_clock_time;
            entry.actual_cpu_time = actual_cpu_time;
        }
    }

    /// Stores the finished length (in MI) of the current execution.
    pub fn set_finished_so_far(&mut self, length: u64) {
        self.finished_so_far = length;
        if let Some(entry) = self.executions.last_mut() {
            entry.finished_so_far = length;
        }
    }

    /// Returns the finished length in MI, never more than the job length.
    pub fn finished_so_far(&self) -> u64 {
        self.finished_so_far.min(self.length)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_so_far >= self.length
    }

    pub fn executions(&self) -> &[ExecutionEntry] {
        &self.executions
    }

    pub fn submission_time(&self) -> Option<f64> {
        self.executions.last().map(|entry| entry.submission_time)
    }

    pub fn wall_clock_time(&self) -> f64 {
        self.executions.last().map(|entry| entry.wall_clock_time).unwrap_or(0.)
    }

    pub fn actual_cpu_time(&self) -> f64 {
        self.executions.last().map(|entry| entry.actual_cpu_time).unwrap_or(0.)
    }

    /// Returns the time between the submission to the last machine and the execution start.
    pub fn waiting_time(&self) -> f64 {
        match self.submission_time() {
            Some(submission_time) => self.exec_start_time - submission_time,
            None => 0.,
        }
    }

    /// Returns the total cost of all executions.
    pub fn processing_cost(&self) -> f64 {
        self.executions
            .iter()
            .map(|entry| entry.actual_cpu_time * entry.cost_per_sec)
            .sum()
    }

    pub fn utilization_of_cpu(&self, time: f64) -> f64 {
        self.cpu_model.utilization(time)
    }

    pub fn utilization_of_ram(&self, time: f64) -> f64 {
        self.ram_model.utilization(time)
    }

    pub fn utilization_of_bw(&self, time: f64) -> f64 {
        self.bw_model.utilization(time)
    }

    /// Returns the recorded history or `None` if the recording is disabled.
    pub fn history(&self) -> Option<&[String]> {
        self.history.as_deref()
    }

    fn write(&mut self, time: f64, message: String) {
        if let Some(history) = self.history.as_mut() {
            history.push(format!("{:.3} {}", time, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_jobs_are_rejected() {
        assert!(matches!(Job::new(1, 0, 1), Err(SchedulingError::InvalidJob { job_id: 1, .. })));
        assert!(matches!(Job::new(2, 10, 0), Err(SchedulingError::InvalidJob { job_id: 2, .. })));
    }

    #[test]
    fn status_codes() {
        let mut job = Job::new(0, 100, 1).unwrap();
        assert_eq!(job.set_status_code(42, 0.), Err(SchedulingError::InvalidJobStatus(42)));
        assert_eq!(job.status(), JobStatus::Created);
        job.set_status_code(4, 3.).unwrap();
        assert_eq!(job.status(), JobStatus::Success);
        assert_eq!(job.finish_time(), Some(3.));
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }

    #[test]
    fn cost_is_summed_over_executions() {
        let mut job = Job::new(0, 100, 1).unwrap().with_history();
        job.set_machine_parameter(0, "m0", 2.);
        job.set_submission_time(1.);
        job.set_exec_param(5., 4.);
        job.set_machine_parameter(1, "m1", 0.5);
        job.set_exec_param(3., 2.);
        assert_eq!(job.processing_cost(), 9.);
        assert_eq!(job.executions().len(), 2);
        assert_eq!(job.history().unwrap().len(), 1);
    }
}
