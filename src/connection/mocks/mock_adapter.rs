//! Mocked implementation of BluetoothAdapter for use in test

use std::sync::{Arc, Mutex};

use crate::{
    connection::orchestrator::BluetoothAdapter,
    core::device::Device,
    profile::{ProfileHandle, ProfileKind},
};

#[derive(Debug)]
struct MockAdapterState {
    enabled: bool,
    permission: bool,
    bonded: Vec<Device>,
    closed: Vec<ProfileKind>,
}

/// An adapter whose answers the test sets directly. Clones share state.
#[derive(Debug, Clone)]
pub struct MockAdapter {
    state: Arc<Mutex<MockAdapterState>>,
}

impl MockAdapter {
    /// An enabled adapter with the connect permission granted and the given
    /// bonded devices
    pub fn new(bonded: Vec<Device>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockAdapterState {
                enabled: true,
                permission: true,
                bonded,
                closed: Vec::new(),
            })),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().enabled = enabled;
    }

    pub fn set_permission(&self, permission: bool) {
        self.state.lock().unwrap().permission = permission;
    }

    pub fn set_bonded(&self, bonded: Vec<Device>) {
        self.state.lock().unwrap().bonded = bonded;
    }

    /// Profiles released through `close_profile`, in call order
    pub fn closed_profiles(&self) -> Vec<ProfileKind> {
        self.state.lock().unwrap().closed.clone()
    }
}

impl BluetoothAdapter for MockAdapter {
    fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    fn bonded_devices(&self) -> Vec<Device> {
        self.state.lock().unwrap().bonded.clone()
    }

    fn has_connect_permission(&self) -> bool {
        self.state.lock().unwrap().permission
    }

    fn close_profile(&self, kind: ProfileKind, _handle: Arc<dyn ProfileHandle>) {
        self.state.lock().unwrap().closed.push(kind);
    }
}
