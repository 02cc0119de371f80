//! A classic (BR/EDR) Bluetooth device address

use std::convert::TryInto;
use std::fmt::{Debug, Display, Formatter, Result};

/// The 6 address bytes of a remote device, most significant byte first
#[derive(Copy, Clone, Hash, PartialEq, Eq, Default)]
pub struct RawAddress {
    val: [u8; 6],
}

impl RawAddress {
    /// An empty/invalid address
    pub const EMPTY: Self = Self { val: [0; 6] };

    /// Constructor
    pub const fn new(val: [u8; 6]) -> Self {
        Self { val }
    }

    /// Constructs an address from a vector of exactly 6 bytes.
    pub fn from_byte_vec(raw_addr: &[u8]) -> Option<RawAddress> {
        let val: [u8; 6] = raw_addr.try_into().ok()?;
        Some(RawAddress { val })
    }

    /// Parses the colon separated form, e.g. "11:22:33:AA:BB:CC". Case does not matter.
    pub fn from_string<S: AsRef<str>>(addr: S) -> Option<RawAddress> {
        let s = addr.as_ref().split(':').collect::<Vec<&str>>();

        if s.len() != 6 {
            return None;
        }

        let mut raw: [u8; 6] = [0; 6];
        for (byte, part) in raw.iter_mut().zip(s) {
            if part.len() != 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }

        Some(RawAddress { val: raw })
    }

    pub fn to_byte_arr(&self) -> [u8; 6] {
        self.val
    }
}

impl Display for RawAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.val[0], self.val[1], self.val[2], self.val[3], self.val[4], self.val[5]
        )
    }
}

impl Debug for RawAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        Display::fmt(self, f)
    }
}
