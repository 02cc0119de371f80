//! What the orchestrator tells the user about itself.

use std::fmt::{self, Display};

use crate::core::device::Device;

/// The semantic category of the current status. Rendering is up to the sink;
/// `Display` gives a plain English default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Nothing to do right now, or waiting for the next retry
    Idle,
    /// Looking through the bonded devices
    Scanning,
    /// Dialling this device
    Connecting(Device),
    /// This device is connected
    Connected(Device),
    /// Retries are used up until the adapter is power cycled or a reset
    Exhausted,
    /// The orchestrator has shut down
    Stopped,
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Idle => write!(f, "Idle"),
            Status::Scanning => write!(f, "Searching for audio devices"),
            Status::Connecting(device) => {
                write!(f, "Attempting to connect to {}", device.display_name())
            }
            Status::Connected(device) => write!(f, "Connected to {}", device.display_name()),
            Status::Exhausted => write!(f, "Idle (gave up reconnecting)"),
            Status::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Receives every status update, e.g. to refresh a notification
pub trait StatusSink: Send + Sync {
    fn on_status_changed(&self, status: &Status);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{address::RawAddress, cod::ClassOfDevice};

    #[test]
    fn test_status_strings() {
        let device =
            Device::new(RawAddress::new([1, 2, 3, 4, 5, 6]), "Car Kit", ClassOfDevice(0x340420));

        assert_eq!(Status::Idle.to_string(), "Idle");
        assert_eq!(Status::Connected(device.clone()).to_string(), "Connected to Car Kit");
        assert_eq!(Status::Connecting(device).to_string(), "Attempting to connect to Car Kit");
    }
}
