//! Processing slots (physical cores) of a machine.

use std::fmt::{Display, Formatter};

use serde::Serialize;

/// Status of processing slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SlotStatus {
    Free,
    Busy,
    Failed,
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            SlotStatus::Free => write!(f, "free"),
            SlotStatus::Busy => write!(f, "busy"),
            SlotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Single CPU core with a fixed MIPS rating.
///
/// Slot does not store which VMs use it, this bookkeeping belongs to the VM scheduler of the machine.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessingSlot {
    pub id: u32,
    mips: f64,
    status: SlotStatus,
}

impl ProcessingSlot {
    /// Creates a free slot.
    pub fn new(id: u32, mips: f64) -> Self {
        Self {
            id,
            mips,
            status: SlotStatus::Free,
        }
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn set_mips(&mut self, mips: f64) {
        self.mips = mips;
    }

    pub fn status(&self) -> SlotStatus {
        self.status
    }

    pub fn set_status(&mut self, status: SlotStatus) {
        self.status = status;
    }

    pub fn is_failed(&self) -> bool {
        self.status == SlotStatus::Failed
    }
}

/// Creates `count` identical slots with ids starting from zero.
pub fn make_slots(count: u32, mips: f64) -> Vec<ProcessingSlot> {
    (0..count).map(|id| ProcessingSlot::new(id, mips)).collect()
}

/// Returns the total MIPS of the slots.
pub fn total_mips(slots: &[ProcessingSlot]) -> f64 {
    slots.iter().map(|slot| slot.mips()).sum()
}

/// Returns the number of slots with the specified status.
pub fn count_with_status(slots: &[ProcessingSlot], status: SlotStatus) -> usize {
    slots.iter().filter(|slot| slot.status() == status).count()
}
