//! Errors which can't be handled by the scheduling engine itself.
//!
//! Admission failures and unknown ids are not errors: they are reported with `false`, `0.0` or `None`.

use std::fmt::{Display, Formatter};

/// Error raised by the scheduling engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulingError {
    /// Numeric job status code outside of the known range.
    InvalidJobStatus(u8),
    /// Job parameters are out of the allowed range.
    InvalidJob {
        /// Job id.
        job_id: u64,
        /// Violated requirement.
        reason: String,
    },
    /// Allocated MIPS can't be placed on the physical slots of a machine.
    InsufficientSlotCapacity {
        /// Key of the VM whose allocation was being placed.
        vm: String,
        /// MIPS left without a slot.
        remaining: f64,
    },
    /// Destination machine can't reserve resources for a VM being migrated in.
    MigrationAdmission {
        /// Key of the migrating VM.
        vm: String,
        /// Destination machine id.
        machine_id: u32,
        /// Resource which is not enough.
        resource: &'static str,
    },
    /// Configuration can't be read or resolved.
    Config(String),
}

impl Display for SchedulingError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SchedulingError::InvalidJobStatus(code) => write!(f, "invalid job status code {}", code),
            SchedulingError::InvalidJob { job_id, reason } => write!(f, "invalid job #{}: {}", job_id, reason),
            SchedulingError::InsufficientSlotCapacity { vm, remaining } => {
                write!(f, "there is not enough MIPS ({}) to accommodate vm {}", remaining, vm)
            }
            SchedulingError::MigrationAdmission {
                vm,
                machine_id,
                resource,
            } => write!(
                f,
                "not enough {} on machine #{} for migration of vm {}",
                resource, machine_id, vm
            ),
            SchedulingError::Config(msg) => write!(f, "config error: {}", msg),
        }
    }
}

impl std::error::Error for SchedulingError {}
