//! The connection surface of the two audio profiles.
//!
//! A [`ProfileHandle`] is handed to us by the platform once its profile proxy
//! is bound, and may be revoked at any time. Commands only start work on the
//! platform side: the outcome of a handshake is reported later through a
//! connection state change, never through the return value.

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use num_traits::cast::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::core::device::Device;

/// The two independent audio sub-protocols negotiated over the same link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ProfileKind {
    /// Hands-free / headset profile carrying call audio
    Call = 1,
    /// Advanced audio distribution profile carrying media audio
    Media = 2,
}

impl ProfileKind {
    pub fn from_raw(profile: u32) -> Option<Self> {
        ProfileKind::from_u32(profile)
    }
}

impl Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileKind::Call => write!(f, "HFP"),
            ProfileKind::Media => write!(f, "A2DP"),
        }
    }
}

/// Connection state of one profile towards one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u32)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl From<u32> for ConnectionState {
    /// Anything the platform reports that is not connecting or connected
    /// (including "disconnecting") counts as disconnected.
    fn from(item: u32) -> Self {
        ConnectionState::from_u32(item).unwrap_or(ConnectionState::Disconnected)
    }
}

/// Errors reported by the platform when a profile command cannot be issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    /// The proxy was revoked underneath us
    Unavailable,
    /// The platform threw while handling the call
    Rejected(String),
    /// The permission to manage connections was taken away
    PermissionRevoked,
}

impl Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Unavailable => write!(f, "profile proxy unavailable"),
            ProfileError::Rejected(reason) => write!(f, "rejected by platform: {}", reason),
            ProfileError::PermissionRevoked => write!(f, "connect permission revoked"),
        }
    }
}

impl std::error::Error for ProfileError {}

/// The operations a bound profile proxy offers. All calls return immediately.
pub trait ProfileHandle: Debug + Send + Sync {
    /// Ask the platform to start a handshake. `Ok(true)` means the handshake
    /// began, not that it succeeded.
    fn connect(&self, device: &Device) -> Result<bool, ProfileError>;

    /// Ask the platform to tear down (or abandon) a connection to the device.
    fn disconnect(&self, device: &Device) -> Result<bool, ProfileError>;

    /// Current state of this profile towards the device
    fn connection_state(&self, device: &Device) -> ConnectionState;

    /// All devices currently connected over this profile
    fn connected_devices(&self) -> Vec<Device>;
}

/// The profile handles currently bound. A kind that is not present is
/// unbound: it answers every query as disconnected and every command as
/// not accepted.
#[derive(Debug, Default, Clone)]
pub struct ProfileHandles {
    handles: HashMap<ProfileKind, Arc<dyn ProfileHandle>>,
}

impl ProfileHandles {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly bound handle, replacing any previous one of this kind
    pub fn bind(&mut self, kind: ProfileKind, handle: Arc<dyn ProfileHandle>) {
        self.handles.insert(kind, handle);
    }

    /// Forget the handle of this kind, returning it if it was bound
    pub fn unbind(&mut self, kind: ProfileKind) -> Option<Arc<dyn ProfileHandle>> {
        self.handles.remove(&kind)
    }

    pub fn get(&self, kind: ProfileKind) -> Option<Arc<dyn ProfileHandle>> {
        self.handles.get(&kind).cloned()
    }

    pub fn is_bound(&self, kind: ProfileKind) -> bool {
        self.handles.contains_key(&kind)
    }

    /// Whether every listed kind is bound
    pub fn all_bound(&self, kinds: &[ProfileKind]) -> bool {
        kinds.iter().all(|kind| self.is_bound(*kind))
    }

    /// Connection state of the device over this kind, `Disconnected` if unbound
    pub fn state_of(&self, kind: ProfileKind, device: &Device) -> ConnectionState {
        match self.handles.get(&kind) {
            Some(handle) => handle.connection_state(device),
            None => ConnectionState::Disconnected,
        }
    }

    /// Whether the device is connected over this kind
    pub fn is_connected(&self, kind: ProfileKind, device: &Device) -> bool {
        self.state_of(kind, device) == ConnectionState::Connected
    }

    /// Devices connected over this kind, empty if unbound
    pub fn connected_devices(&self, kind: ProfileKind) -> Vec<Device> {
        match self.handles.get(&kind) {
            Some(handle) => handle.connected_devices(),
            None => Vec::new(),
        }
    }

    /// Remove and return every bound handle
    pub fn drain(&mut self) -> Vec<(ProfileKind, Arc<dyn ProfileHandle>)> {
        self.handles.drain().collect()
    }
}
