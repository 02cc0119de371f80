//! This module keeps a paired audio accessory connected. It decides when to
//! look for a device, which bonded device to dial, how long to wait for the
//! platform to confirm a handshake, and when to retry or give up.
//!
//! Only one attempt cycle ever runs at a time; every trigger (adapter power,
//! profile proxy binding, retry timer, device drop) merely requests a cycle.

pub mod mocks;
pub mod orchestrator;
pub mod policy;
pub mod retry;
pub mod selector;
pub mod signal;
pub mod status;

pub use orchestrator::{BluetoothAdapter, Orchestrator, OrchestratorState, PlatformEvent, Snapshot};
pub use policy::{ConnectionPolicy, Requirement};
pub use status::{Status, StatusSink};
