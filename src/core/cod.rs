//! Helpers to parse the class of device (CoD) advertised by a remote device.

use bitflags::bitflags;

const MAJOR_AUDIO_VIDEO: u32 = 0x04;

// Minor classes within the audio/video major class (format bits masked out)
const MINOR_AV_UNCATEGORIZED: u32 = 0x00;
const MINOR_AV_WEARABLE_HEADSET: u32 = 0x04;
const MINOR_AV_HANDSFREE: u32 = 0x08;
const MINOR_AV_LOUDSPEAKER: u32 = 0x14;
const MINOR_AV_HEADPHONES: u32 = 0x18;
const MINOR_AV_PORTABLE_AUDIO: u32 = 0x1c;
const MINOR_AV_CAR_AUDIO: u32 = 0x20;
const MINOR_AV_HIFI_AUDIO: u32 = 0x28;

bitflags! {
    /// Major service classes, bits 13 to 23 of the CoD
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ServiceClass: u32 {
        const LIMITED_DISCOVERABLE = 1 << 13;
        const POSITIONING = 1 << 16;
        const NETWORKING = 1 << 17;
        const RENDERING = 1 << 18;
        const CAPTURING = 1 << 19;
        const OBJECT_TRANSFER = 1 << 20;
        const AUDIO = 1 << 21;
        const TELEPHONY = 1 << 22;
        const INFORMATION = 1 << 23;
    }
}

/// The raw 24-bit class of device of a remote device
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct ClassOfDevice(pub u32);

impl ClassOfDevice {
    /// Class reported by devices whose class is not known
    pub const UNKNOWN: Self = ClassOfDevice(0);

    pub fn major(&self) -> u32 {
        (self.0 & 0x1f00) >> 8
    }

    pub fn minor(&self) -> u32 {
        self.0 & 0xfc
    }

    pub fn service_classes(&self) -> ServiceClass {
        ServiceClass::from_bits_truncate(self.0)
    }

    /// Whether this class describes something that plays audio to the user or
    /// carries call audio (headsets, speakers, car kits).
    pub fn is_audio_sink(&self) -> bool {
        if self.major() != MAJOR_AUDIO_VIDEO {
            return false;
        }

        matches!(
            self.minor(),
            MINOR_AV_UNCATEGORIZED
                | MINOR_AV_WEARABLE_HEADSET
                | MINOR_AV_HANDSFREE
                | MINOR_AV_LOUDSPEAKER
                | MINOR_AV_HEADPHONES
                | MINOR_AV_PORTABLE_AUDIO
                | MINOR_AV_CAR_AUDIO
                | MINOR_AV_HIFI_AUDIO
        )
    }
}

impl From<u32> for ClassOfDevice {
    fn from(cod: u32) -> Self {
        ClassOfDevice(cod & 0x00ff_ffff)
    }
}
