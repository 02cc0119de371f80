//! Utilities shared by the orchestrator and its tests

pub mod owned_handle;
pub mod task;
