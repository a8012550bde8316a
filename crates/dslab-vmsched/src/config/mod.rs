//! Scheduling configuration.

pub mod options;

use serde::{Deserialize, Serialize};

use crate::error::SchedulingError;

/// Holds raw scheduling config parsed from YAML file.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
struct RawSchedulingConfig {
    pub min_time_between_events: Option<f64>,
    pub machines: Option<Vec<MachineConfig>>,
    pub vms: Option<Vec<VmConfig>>,
    pub jobs: Option<Vec<JobConfig>>,
}

/// Holds configuration of a single machine or a set of identical machines.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct MachineConfig {
    /// Machine name.
    /// Should be set if count = 1.
    pub name: Option<String>,
    /// Machine name prefix.
    /// Full name is produced by appending machine instance number to the prefix.
    /// Should be set if count > 1.
    pub name_prefix: Option<String>,
    /// Number of processing slots.
    pub slots: u32,
    /// MIPS of each slot.
    pub mips: f64,
    /// RAM capacity in MB.
    pub ram: u64,
    /// Bandwidth capacity.
    pub bw: u64,
    /// Storage capacity in MB.
    pub storage: u64,
    /// Price of one second of CPU time.
    pub cost_per_sec: Option<f64>,
    /// VM scheduler policy, `TimeShared` by default.
    pub vm_scheduler: Option<String>,
    /// Whether allocations follow the current VM demand on every update.
    pub dynamic_workload: Option<bool>,
    /// Number of such machines.
    pub count: Option<u32>,
}

impl MachineConfig {
    /// Returns names of all machine instances described by this config.
    pub fn instance_names(&self) -> Vec<String> {
        let count = self.count.unwrap_or(1);
        if count == 1 {
            if let Some(name) = &self.name {
                return vec![name.clone()];
            }
        }
        let prefix = self.name_prefix.as_deref().unwrap_or("machine-");
        (0..count).map(|i| format!("{}{}", prefix, i)).collect()
    }
}

/// Holds configuration of a single VM or a set of identical VMs.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct VmConfig {
    /// Owner of VM.
    pub user_id: Option<u32>,
    /// MIPS of each virtual slot.
    pub mips: f64,
    /// Number of virtual slots.
    pub slots: u32,
    /// RAM in MB.
    pub ram: u64,
    /// Bandwidth.
    pub bw: u64,
    /// Image size in MB.
    pub size: u64,
    /// Virtual machine monitor name.
    pub vmm: Option<String>,
    /// Job scheduler policy, `TimeShared` by default.
    pub job_scheduler: Option<String>,
    /// Number of such VMs.
    pub count: Option<u32>,
}

/// Holds configuration of a single job or a set of identical jobs.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    /// Length in MI.
    pub length: u64,
    /// Number of required slots, 1 by default.
    pub slots: Option<u32>,
    /// Id of VM the job is submitted to (VM ids are assigned in config order starting from 0).
    pub vm: u32,
    /// Submission time, 0 by default.
    pub submit_time: Option<f64>,
    /// Input file size.
    pub file_size: Option<u64>,
    /// Output file size.
    pub output_size: Option<u64>,
    /// CPU utilization model, `Full` by default.
    pub cpu_model: Option<String>,
    /// RAM utilization model, `Full` by default.
    pub ram_model: Option<String>,
    /// Bandwidth utilization model, `Full` by default.
    pub bw_model: Option<String>,
    /// Number of such jobs.
    pub count: Option<u32>,
}

/// Represents scheduling configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct SchedulingConfig {
    /// Predicted events closer than this to the current time are moved forward by this amount.
    pub min_time_between_events: f64,
    /// Configurations of machines.
    pub machines: Vec<MachineConfig>,
    /// Configurations of VMs.
    pub vms: Vec<VmConfig>,
    /// Configurations of jobs.
    pub jobs: Vec<JobConfig>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            min_time_between_events: 0.1,
            machines: Vec::new(),
            vms: Vec::new(),
            jobs: Vec::new(),
        }
    }
}

impl SchedulingConfig {
    /// Creates scheduling config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, SchedulingError> {
        let content = std::fs::read_to_string(file_name)
            .map_err(|e| SchedulingError::Config(format!("can't read file {}: {}", file_name, e)))?;
        Self::from_yaml_str(&content)
            .map_err(|e| SchedulingError::Config(format!("can't parse YAML from file {}: {}", file_name, e)))
    }

    /// Creates scheduling config from YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchedulingError> {
        let raw: RawSchedulingConfig =
            serde_yaml::from_str(yaml).map_err(|e| SchedulingError::Config(e.to_string()))?;
        let config = Self {
            min_time_between_events: raw.min_time_between_events.unwrap_or(0.1),
            machines: raw.machines.unwrap_or_default(),
            vms: raw.vms.unwrap_or_default(),
            jobs: raw.jobs.unwrap_or_default(),
        };
        if config.min_time_between_events < 0. {
            return Err(SchedulingError::Config(
                "min_time_between_events can't be negative".to_string(),
            ));
        }
        Ok(config)
    }

    /// Returns total number of VMs described by the config.
    pub fn vm_count(&self) -> u32 {
        self.vms.iter().map(|vm| vm.count.unwrap_or(1)).sum()
    }
}
