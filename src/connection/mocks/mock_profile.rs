//! Mocked implementation of ProfileHandle for use in test

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver};

use crate::{
    core::{address::RawAddress, device::Device},
    profile::{ConnectionState, ProfileError, ProfileHandle},
};

/// Events representing calls to ProfileHandle commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockProfileEvents {
    /// ProfileHandle#connect invoked
    Connect(RawAddress),
    /// ProfileHandle#disconnect invoked
    Disconnect(RawAddress),
}

#[derive(Debug)]
struct MockProfileState {
    states: Vec<(Device, ConnectionState)>,
    connect_response: Result<bool, ProfileError>,
    disconnect_response: Result<bool, ProfileError>,
    state_after_connect: Option<ConnectionState>,
}

/// Routes commands into a channel of MockProfileEvents and answers queries
/// from a table the test controls. Clones share the same table and channel.
#[derive(Debug, Clone)]
pub struct MockProfileHandle {
    state: Arc<Mutex<MockProfileState>>,
    tx: mpsc::UnboundedSender<MockProfileEvents>,
}

impl MockProfileHandle {
    /// Constructor. Returns self and the RX side of the associated channel.
    /// By default every command is accepted and nothing is connected.
    pub fn new() -> (Self, UnboundedReceiver<MockProfileEvents>) {
        let (tx, rx) = unbounded_channel();
        let state = MockProfileState {
            states: Vec::new(),
            connect_response: Ok(true),
            disconnect_response: Ok(true),
            state_after_connect: None,
        };
        (Self { state: Arc::new(Mutex::new(state)), tx }, rx)
    }

    /// Set the state reported for the device
    pub fn set_state(&self, device: &Device, state: ConnectionState) {
        let mut inner = self.state.lock().unwrap();
        inner.states.retain(|(d, _)| d != device);
        inner.states.push((device.clone(), state));
    }

    /// What `connect` answers from now on
    pub fn set_connect_response(&self, response: Result<bool, ProfileError>) {
        self.state.lock().unwrap().connect_response = response;
    }

    /// What `disconnect` answers from now on
    pub fn set_disconnect_response(&self, response: Result<bool, ProfileError>) {
        self.state.lock().unwrap().disconnect_response = response;
    }

    /// Move an accepted device straight to this state, as if the platform had
    /// completed the handshake before anyone looked
    pub fn complete_connects_with(&self, state: ConnectionState) {
        self.state.lock().unwrap().state_after_connect = Some(state);
    }
}

impl ProfileHandle for MockProfileHandle {
    fn connect(&self, device: &Device) -> Result<bool, ProfileError> {
        self.tx.send(MockProfileEvents::Connect(device.address)).ok();
        let (response, next) = {
            let inner = self.state.lock().unwrap();
            (inner.connect_response.clone(), inner.state_after_connect)
        };
        if let (Ok(true), Some(next)) = (&response, next) {
            self.set_state(device, next);
        }
        response
    }

    fn disconnect(&self, device: &Device) -> Result<bool, ProfileError> {
        self.tx.send(MockProfileEvents::Disconnect(device.address)).ok();
        let response = self.state.lock().unwrap().disconnect_response.clone();
        if let Ok(true) = response {
            self.set_state(device, ConnectionState::Disconnected);
        }
        response
    }

    fn connection_state(&self, device: &Device) -> ConnectionState {
        self.state
            .lock()
            .unwrap()
            .states
            .iter()
            .find(|(d, _)| d == device)
            .map(|(_, state)| *state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn connected_devices(&self) -> Vec<Device> {
        self.state
            .lock()
            .unwrap()
            .states
            .iter()
            .filter(|(_, state)| *state == ConnectionState::Connected)
            .map(|(d, _)| d.clone())
            .collect()
    }
}
