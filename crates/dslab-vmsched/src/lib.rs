#![doc = include_str!("../readme.md")]

pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod job_scheduler;
pub mod job_schedulers;
pub mod log;
pub mod machine;
pub mod provisioner;
pub mod record;
pub mod slot;
pub mod utilization_model;
pub mod vm;
pub mod vm_scheduler;
pub mod vm_schedulers;

pub use colored;
pub use context::{Environment, SchedulingContext, SimulationClock};
pub use error::SchedulingError;

/// Number of instruction units in one million instructions (MI).
///
/// Job progress is tracked in these units so that fractional MI produced by a tick is not lost.
pub const MILLION: f64 = 1_000_000.;

/// Tolerance used when comparing MIPS amounts.
pub const EPSILON: f64 = 1e-9;
