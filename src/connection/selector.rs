//! Narrows the bonded devices down to the ones worth dialling.

use log::debug;

use crate::{connection::policy::ConnectionPolicy, core::device::Device, profile::ProfileHandles};

/// Returns the bonded devices, in bonded-list order, that can carry audio and
/// are not already fully connected. Never fails; nothing qualifying yields an
/// empty list.
pub fn select_candidates(
    bonded: &[Device],
    handles: &ProfileHandles,
    policy: &ConnectionPolicy,
) -> Vec<Device> {
    bonded
        .iter()
        .filter(|device| {
            if !device.class.is_audio_sink() {
                debug!(
                    "Skipping {} (major {:#x}, services {:?}): not an audio device",
                    device.address,
                    device.class.major(),
                    device.class.service_classes()
                );
                return false;
            }
            if policy.is_fully_connected(handles, device) {
                debug!("Skipping {}: already connected", device.address);
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::{
        connection::{mocks::mock_profile::MockProfileHandle, policy::Requirement},
        core::{address::RawAddress, cod::ClassOfDevice},
        profile::{ConnectionState, ProfileKind},
    };

    const HEADSET_COD: ClassOfDevice = ClassOfDevice(0x240404);
    const CAR_COD: ClassOfDevice = ClassOfDevice(0x340420);
    const KEYBOARD_COD: ClassOfDevice = ClassOfDevice(0x0540);

    fn device(last: u8, name: &str, class: ClassOfDevice) -> Device {
        Device::new(RawAddress::new([0, 0, 0, 0, 0, last]), name, class)
    }

    fn handles_with(
        call: &MockProfileHandle,
        media: &MockProfileHandle,
    ) -> ProfileHandles {
        let mut handles = ProfileHandles::new();
        handles.bind(ProfileKind::Call, Arc::new(call.clone()));
        handles.bind(ProfileKind::Media, Arc::new(media.clone()));
        handles
    }

    #[test]
    fn test_only_audio_devices_are_selected() {
        // arrange
        let (call, _call_rx) = MockProfileHandle::new();
        let (media, _media_rx) = MockProfileHandle::new();
        let device_a = device(1, "DeviceA", HEADSET_COD);
        let device_b = device(2, "DeviceB", KEYBOARD_COD);

        // act
        let candidates = select_candidates(
            &[device_a.clone(), device_b],
            &handles_with(&call, &media),
            &ConnectionPolicy::default(),
        );

        // assert
        assert_eq!(candidates, vec![device_a]);
    }

    #[test]
    fn test_order_is_bonded_order() {
        // arrange
        let (call, _call_rx) = MockProfileHandle::new();
        let (media, _media_rx) = MockProfileHandle::new();
        let car = device(3, "Car", CAR_COD);
        let headset = device(1, "Headset", HEADSET_COD);

        // act
        let candidates = select_candidates(
            &[car.clone(), headset.clone()],
            &handles_with(&call, &media),
            &ConnectionPolicy::default(),
        );

        // assert
        assert_eq!(candidates, vec![car, headset]);
    }

    #[test]
    fn test_fully_connected_device_is_excluded() {
        // arrange: the headset is connected on both profiles
        let (call, _call_rx) = MockProfileHandle::new();
        let (media, _media_rx) = MockProfileHandle::new();
        let headset = device(1, "Headset", HEADSET_COD);
        call.set_state(&headset, ConnectionState::Connected);
        media.set_state(&headset, ConnectionState::Connected);

        // act
        let candidates = select_candidates(
            &[headset],
            &handles_with(&call, &media),
            &ConnectionPolicy::default(),
        );

        // assert
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_partially_connected_device_depends_on_policy() {
        // arrange: the headset is connected for calls only
        let (call, _call_rx) = MockProfileHandle::new();
        let (media, _media_rx) = MockProfileHandle::new();
        let headset = device(1, "Headset", HEADSET_COD);
        call.set_state(&headset, ConnectionState::Connected);
        let handles = handles_with(&call, &media);
        let either =
            ConnectionPolicy { fully_connected: Requirement::Any, ..Default::default() };

        // act
        let requires_both =
            select_candidates(&[headset.clone()], &handles, &ConnectionPolicy::default());
        let requires_either = select_candidates(&[headset.clone()], &handles, &either);

        // assert
        assert_eq!(requires_both, vec![headset]);
        assert!(requires_either.is_empty());
    }

    #[test]
    fn test_nothing_bonded() {
        let candidates =
            select_candidates(&[], &ProfileHandles::new(), &ConnectionPolicy::default());

        assert!(candidates.is_empty());
    }
}
