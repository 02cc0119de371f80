//! Shared data-types and utility methods go here.

pub mod address;
pub mod cod;
pub mod device;
