//! Slot allocation policies.

pub mod oversubscribed;
pub mod space_shared;
pub mod time_shared;
