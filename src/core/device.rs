//! A bonded remote device as reported by the platform

use std::hash::{Hash, Hasher};

use crate::core::{address::RawAddress, cod::ClassOfDevice};

/// An immutable view of a bonded device. Two devices are the same device if
/// their addresses match, regardless of name or class.
#[derive(Clone, Debug)]
pub struct Device {
    pub address: RawAddress,
    pub name: String,
    pub class: ClassOfDevice,
}

impl Device {
    /// Constructor
    pub fn new(address: RawAddress, name: impl Into<String>, class: ClassOfDevice) -> Self {
        Self { address, name: name.into(), class }
    }

    /// The name to show to the user, falling back to the address for unnamed devices
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.address.to_string()
        } else {
            self.name.clone()
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Device {}

impl Hash for Device {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}
