//! Job scheduling policies.

pub mod single_service;
pub mod space_shared;
pub mod time_shared;
