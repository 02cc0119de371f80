use std::{io::Write, sync::Arc, time::Duration};

use bt_autoconnect::{
    config::read_policy,
    connection::{
        mocks::{
            mock_adapter::MockAdapter,
            mock_profile::{MockProfileEvents, MockProfileHandle},
            mock_status::MockStatusSink,
        },
        selector::select_candidates,
        ConnectionPolicy, Orchestrator, OrchestratorState, PlatformEvent, Status,
    },
    core::{address::RawAddress, cod::ClassOfDevice, device::Device},
    profile::{ConnectionState, ProfileHandles, ProfileKind},
};
use tokio::{runtime::Handle, sync::mpsc::UnboundedReceiver};
use utils::start_test;

mod utils;

const DEVICE_A: RawAddress = RawAddress::new([0xa0, 0x00, 0x00, 0x00, 0x00, 0x0a]);
const DEVICE_B: RawAddress = RawAddress::new([0xb0, 0x00, 0x00, 0x00, 0x00, 0x0b]);

// wearable headset, rendering + audio service classes
const HEADSET_COD: ClassOfDevice = ClassOfDevice(0x240404);
// keyboard
const PERIPHERAL_COD: ClassOfDevice = ClassOfDevice(0x002540);

fn device_a() -> Device {
    Device::new(DEVICE_A, "Device A", HEADSET_COD)
}

fn device_b() -> Device {
    Device::new(DEVICE_B, "Device B", PERIPHERAL_COD)
}

struct Platform {
    adapter: MockAdapter,
    call: MockProfileHandle,
    call_rx: UnboundedReceiver<MockProfileEvents>,
    media: MockProfileHandle,
    status_rx: UnboundedReceiver<Status>,
}

fn start_orchestrator(policy: ConnectionPolicy) -> (Orchestrator, Platform) {
    let adapter = MockAdapter::new(vec![device_b(), device_a()]);
    let (sink, status_rx) = MockStatusSink::new();
    let (call, call_rx) = MockProfileHandle::new();
    let (media, _) = MockProfileHandle::new();
    let orchestrator =
        Orchestrator::new(Handle::current(), Arc::new(adapter.clone()), Arc::new(sink), policy);
    (orchestrator, Platform { adapter, call, call_rx, media, status_rx })
}

fn bind_profiles(orchestrator: &Orchestrator, platform: &Platform) {
    orchestrator
        .dispatch_event(PlatformEvent::ProfileBound(ProfileKind::Call, Arc::new(platform.call.clone())));
    orchestrator.dispatch_event(PlatformEvent::ProfileBound(
        ProfileKind::Media,
        Arc::new(platform.media.clone()),
    ));
}

async fn expect_status(rx: &mut UnboundedReceiver<Status>, expected: Status) {
    while let Some(status) = rx.recv().await {
        if status == expected {
            return;
        }
    }
    panic!("status channel closed before {:?}", expected);
}

fn drain_connects(rx: &mut UnboundedReceiver<MockProfileEvents>) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if let MockProfileEvents::Connect(_) = event {
            count += 1;
        }
    }
    count
}

#[test]
fn test_selector_picks_audio_device_only() {
    let handles = ProfileHandles::new();

    let candidates =
        select_candidates(&[device_a(), device_b()], &handles, &ConnectionPolicy::default());

    assert_eq!(candidates, vec![device_a()]);
}

#[test]
fn test_reconnects_through_power_cycle() {
    start_test(async {
        // arrange: the platform completes every handshake it accepts
        let (orchestrator, mut platform) = start_orchestrator(ConnectionPolicy::default());
        platform.call.complete_connects_with(ConnectionState::Connected);
        platform.media.complete_connects_with(ConnectionState::Connected);

        // act
        bind_profiles(&orchestrator, &platform);

        // assert
        expect_status(&mut platform.status_rx, Status::Connected(device_a())).await;

        // act: the radio goes off and the platform drops the link
        platform.adapter.set_enabled(false);
        platform.call.set_state(&device_a(), ConnectionState::Disconnected);
        platform.media.set_state(&device_a(), ConnectionState::Disconnected);
        orchestrator.dispatch_event(PlatformEvent::AdapterDisabled);

        // assert
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.state, OrchestratorState::Idle);
        assert_eq!(snapshot.current, None);
        assert!(!orchestrator.is_retry_pending());

        // act: power comes back
        platform.adapter.set_enabled(true);
        orchestrator.dispatch_event(PlatformEvent::AdapterEnabled);

        // assert
        expect_status(&mut platform.status_rx, Status::Connected(device_a())).await;
        assert_eq!(orchestrator.snapshot().retry_count, 0);

        // act
        orchestrator.shutdown();

        // assert
        assert_eq!(orchestrator.status(), "Stopped");
        assert_eq!(platform.adapter.closed_profiles().len(), 2);
    });
}

#[test]
fn test_gives_up_then_recovers_on_adapter_enable() {
    start_test(async {
        // arrange: the accessory is out of range
        let (orchestrator, mut platform) = start_orchestrator(ConnectionPolicy::default());
        platform.call.set_connect_response(Ok(false));
        platform.media.set_connect_response(Ok(false));

        // act
        bind_profiles(&orchestrator, &platform);
        expect_status(&mut platform.status_rx, Status::Exhausted).await;

        // assert: two cycles dialled, the third gave up
        assert_eq!(drain_connects(&mut platform.call_rx), 2);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(drain_connects(&mut platform.call_rx), 0);

        // act: the accessory is back in range and the radio is power cycled
        platform.call.set_connect_response(Ok(true));
        platform.media.set_connect_response(Ok(true));
        platform.call.complete_connects_with(ConnectionState::Connected);
        platform.media.complete_connects_with(ConnectionState::Connected);
        orchestrator.dispatch_event(PlatformEvent::AdapterDisabled);
        orchestrator.dispatch_event(PlatformEvent::AdapterEnabled);

        // assert
        expect_status(&mut platform.status_rx, Status::Connected(device_a())).await;
    });
}

#[test]
fn test_proxy_revoked_mid_session() {
    start_test(async {
        // arrange
        let (orchestrator, mut platform) = start_orchestrator(ConnectionPolicy::default());
        platform.call.complete_connects_with(ConnectionState::Connected);
        platform.media.complete_connects_with(ConnectionState::Connected);
        bind_profiles(&orchestrator, &platform);
        expect_status(&mut platform.status_rx, Status::Connected(device_a())).await;

        // act: the media proxy goes away and the link drops
        orchestrator.dispatch_event(PlatformEvent::ProfileUnbound(ProfileKind::Media));
        platform.call.set_state(&device_a(), ConnectionState::Disconnected);
        orchestrator.dispatch_event(PlatformEvent::ConnectionStateChanged {
            device: device_a(),
            profile: ProfileKind::Call,
            state: ConnectionState::Disconnected,
        });

        // assert: waits for the proxy instead of dialling
        expect_status(&mut platform.status_rx, Status::Idle).await;
        expect_status(&mut platform.status_rx, Status::Idle).await;
        assert_eq!(orchestrator.snapshot().retry_count, 1);
        assert!(orchestrator.is_retry_pending());

        // act: the proxy is rebound
        orchestrator.dispatch_event(PlatformEvent::ProfileBound(
            ProfileKind::Media,
            Arc::new(platform.media.clone()),
        ));

        // assert
        expect_status(&mut platform.status_rx, Status::Connected(device_a())).await;
        assert!(!orchestrator.is_retry_pending());
    });
}

#[test]
fn test_policy_from_config_file() {
    start_test(async {
        // arrange
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"retry_limit\": 1, \"connect_timeout_ms\": 5000}").unwrap();
        let policy = read_policy(file.path()).unwrap();
        let (orchestrator, mut platform) = start_orchestrator(policy);

        // act: nobody answers
        bind_profiles(&orchestrator, &platform);

        // assert: a single cycle, with the shorter handshake timeout
        assert_eq!(platform.call_rx.recv().await, Some(MockProfileEvents::Connect(DEVICE_A)));
        let started = tokio::time::Instant::now();
        assert_eq!(platform.call_rx.recv().await, Some(MockProfileEvents::Disconnect(DEVICE_A)));
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_secs(20));
        expect_status(&mut platform.status_rx, Status::Exhausted).await;
        assert_eq!(drain_connects(&mut platform.call_rx), 0);
    });
}

#[test]
fn test_events_from_platform_threads() {
    // arrange: a real multi-threaded runtime, events from a foreign thread.
    // Only the call profile is required, so the first binding is enough.
    let rt = tokio::runtime::Runtime::new().unwrap();
    let adapter = MockAdapter::new(vec![device_a()]);
    let (sink, mut status_rx) = MockStatusSink::new();
    let (call, _call_rx) = MockProfileHandle::new();
    let (media, _media_rx) = MockProfileHandle::new();
    call.complete_connects_with(ConnectionState::Connected);
    media.complete_connects_with(ConnectionState::Connected);
    let orchestrator = Orchestrator::new(
        rt.handle().clone(),
        Arc::new(adapter),
        Arc::new(sink),
        ConnectionPolicy {
            required_profiles: vec![ProfileKind::Call],
            dial_order: vec![ProfileKind::Call],
            ..Default::default()
        },
    );

    // act
    std::thread::spawn({
        let orchestrator = orchestrator.clone();
        move || {
            orchestrator.dispatch_event(PlatformEvent::ProfileBound(ProfileKind::Call, Arc::new(call)));
            orchestrator
                .dispatch_event(PlatformEvent::ProfileBound(ProfileKind::Media, Arc::new(media)));
        }
    })
    .join()
    .unwrap();

    // assert
    rt.block_on(async {
        tokio::time::timeout(
            Duration::from_secs(5),
            expect_status(&mut status_rx, Status::Connected(device_a())),
        )
        .await
        .unwrap();
    });
    assert_eq!(orchestrator.snapshot().current, Some(device_a()));
}
