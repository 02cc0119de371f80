//! The reconnection state machine.
//!
//! Triggers (adapter power, profile proxy binding, the retry timer, a dropped
//! device) only ever *request* an attempt cycle. At most one cycle runs at a
//! time, as a task on the runtime; a request while one is running is dropped.
//!
//! The state, the retry counter, the current device and the reported status
//! live behind one lock and are only ever changed together. Every cycle
//! carries the epoch it started in; once the epoch is bumped (adapter off,
//! shutdown) anything the cycle still tries to record is discarded.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, Weak,
};

use log::{debug, error, info, warn};
use tokio::{runtime::Handle, time::Instant};

use crate::{
    connection::{
        policy::{ConnectionPolicy, Requirement},
        retry::RetryTimer,
        selector::select_candidates,
        signal::{EventSignal, WaitOutcome},
        status::{Status, StatusSink},
    },
    core::device::Device,
    profile::{ConnectionState, ProfileError, ProfileHandle, ProfileHandles, ProfileKind},
    utils::owned_handle::OwnedHandle,
};

/// What the orchestrator needs from the local radio adapter
pub trait BluetoothAdapter: Send + Sync {
    /// Whether the radio is powered on
    fn is_enabled(&self) -> bool;

    /// Devices paired with this host, in platform order
    fn bonded_devices(&self) -> Vec<Device>;

    /// Whether we are still allowed to manage connections
    fn has_connect_permission(&self) -> bool;

    /// Hand a profile proxy back to the platform at teardown
    fn close_profile(&self, kind: ProfileKind, handle: Arc<dyn ProfileHandle>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Attempting,
    Connected(Device),
    /// Retries used up; left only on adapter power-on or [`Orchestrator::reset`]
    Exhausted,
}

/// Everything the platform tells us about
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    AdapterEnabled,
    AdapterDisabled,
    ProfileBound(ProfileKind, Arc<dyn ProfileHandle>),
    ProfileUnbound(ProfileKind),
    ConnectionStateChanged { device: Device, profile: ProfileKind, state: ConnectionState },
}

impl PlatformEvent {
    /// Build a state change from the platform's integer codes. Returns None
    /// for profiles we do not manage.
    pub fn from_raw_state_change(device: Device, profile: u32, state: u32) -> Option<Self> {
        Some(PlatformEvent::ConnectionStateChanged {
            device,
            profile: ProfileKind::from_raw(profile)?,
            state: ConnectionState::from(state),
        })
    }
}

/// A consistent view of the orchestrator's mutable state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: OrchestratorState,
    pub retry_count: u32,
    pub current: Option<Device>,
    pub status: Status,
}

#[derive(Debug)]
struct Shared {
    state: OrchestratorState,
    retry_count: u32,
    current: Option<Device>,
    status: Status,
    epoch: u64,
}

/// Outcome of dialling one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialOutcome {
    Connected,
    Failed,
    Fatal,
}

struct Inner {
    runtime: Handle,
    adapter: Arc<dyn BluetoothAdapter>,
    sink: Arc<dyn StatusSink>,
    policy: ConnectionPolicy,
    handles: Mutex<ProfileHandles>,
    shared: Mutex<Shared>,
    signal: EventSignal,
    /// Ticket of the running cycle, 0 if none
    in_flight: AtomicU64,
    next_ticket: AtomicU64,
    worker: Mutex<Option<OwnedHandle<()>>>,
    retry: RetryTimer,
    shut_down: AtomicBool,
}

/// Clears the in-flight ticket when the cycle ends, including when the task
/// is aborted.
struct InFlightGuard {
    inner: Arc<Inner>,
    ticket: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .compare_exchange(self.ticket, 0, Ordering::SeqCst, Ordering::SeqCst)
            .ok();
    }
}

/// Keeps one bonded audio device connected. Cheap to clone; all clones drive
/// the same state machine.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Constructor. Cycles and retry timers are spawned on `runtime`, so
    /// events may be dispatched from any thread.
    pub fn new(
        runtime: Handle,
        adapter: Arc<dyn BluetoothAdapter>,
        sink: Arc<dyn StatusSink>,
        policy: ConnectionPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                runtime,
                adapter,
                sink,
                policy,
                handles: Mutex::new(ProfileHandles::new()),
                shared: Mutex::new(Shared {
                    state: OrchestratorState::Idle,
                    retry_count: 0,
                    current: None,
                    status: Status::Idle,
                    epoch: 0,
                }),
                signal: EventSignal::new(),
                in_flight: AtomicU64::new(0),
                next_ticket: AtomicU64::new(1),
                worker: Mutex::new(None),
                retry: RetryTimer::new(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Kick off the first attempt cycle
    pub fn start(&self) -> bool {
        info!("Starting autoconnect");
        self.request_cycle()
    }

    /// Leave `Exhausted` (or forget past failures) and try again
    pub fn reset(&self) -> bool {
        info!("Resetting retry counter");
        self.clear_failures();
        self.request_cycle()
    }

    /// Stop for good: cancel the retry timer, abort the running cycle and
    /// release the profile proxies. Every later trigger is ignored.
    pub fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down autoconnect");
        self.inner.retry.cancel();
        self.transition(|shared| {
            shared.epoch += 1;
            shared.state = OrchestratorState::Idle;
            shared.current = None;
            Some(Status::Stopped)
        });
        self.abort_worker();

        let released = self.lock_handles().drain();
        for (kind, handle) in released {
            debug!("Closing {} proxy", kind);
            self.inner.adapter.close_profile(kind, handle);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Snapshot {
        let shared = self.lock_shared();
        Snapshot {
            state: shared.state.clone(),
            retry_count: shared.retry_count,
            current: shared.current.clone(),
            status: shared.status.clone(),
        }
    }

    /// The current status, rendered for display
    pub fn status(&self) -> String {
        self.lock_shared().status.to_string()
    }

    /// Whether a delayed re-run is armed
    pub fn is_retry_pending(&self) -> bool {
        self.inner.retry.is_armed()
    }

    /// Start an attempt cycle unless one is already running. Returns whether a
    /// new cycle was started.
    pub fn request_cycle(&self) -> bool {
        if self.is_shut_down() {
            debug!("Ignoring cycle request after shutdown");
            return false;
        }

        // Held until the new worker is stored, so concurrent requests cannot
        // overwrite (and abort) each other's worker.
        let mut worker = self.inner.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::SeqCst);
        if self
            .inner
            .in_flight
            .compare_exchange(0, ticket, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Attempt cycle already running");
            return false;
        }

        let guard = InFlightGuard { inner: self.inner.clone(), ticket };
        let this = self.clone();
        *worker = Some(
            self.inner
                .runtime
                .spawn(async move {
                    let _guard = guard;
                    this.run_attempt_cycle().await;
                })
                .into(),
        );
        true
    }

    /// Feed a platform event into the state machine
    pub fn dispatch_event(&self, event: PlatformEvent) {
        if self.is_shut_down() {
            if let PlatformEvent::ProfileBound(kind, handle) = event {
                debug!("{} bound after shutdown, closing it", kind);
                self.inner.adapter.close_profile(kind, handle);
            }
            return;
        }

        match event {
            PlatformEvent::AdapterEnabled => {
                info!("Adapter enabled");
                self.clear_failures();
                self.request_cycle();
            }
            PlatformEvent::AdapterDisabled => {
                info!("Adapter disabled");
                self.inner.retry.cancel();
                self.transition(|shared| {
                    shared.epoch += 1;
                    shared.state = OrchestratorState::Idle;
                    shared.current = None;
                    Some(Status::Idle)
                });
                self.abort_worker();
            }
            PlatformEvent::ProfileBound(kind, handle) => {
                info!("{} proxy bound", kind);
                self.lock_handles().bind(kind, handle);
                self.request_cycle();
            }
            PlatformEvent::ProfileUnbound(kind) => {
                info!("{} proxy unbound", kind);
                self.lock_handles().unbind(kind);
            }
            PlatformEvent::ConnectionStateChanged { device, profile, state } => {
                self.on_connection_state_changed(device, profile, state);
            }
        }
    }

    fn on_connection_state_changed(
        &self,
        device: Device,
        profile: ProfileKind,
        state: ConnectionState,
    ) {
        debug!("{} {} is now {:?}", device.address, profile, state);
        // any change may end a handshake wait; waiters re-check for themselves
        self.inner.signal.notify_all();

        if state != ConnectionState::Disconnected {
            return;
        }

        let handles = self.handles();
        let policy = &self.inner.policy;
        let fully_dropped = policy.is_fully_dropped(&handles, &device);

        let dropped = {
            let mut shared = self.lock_shared();
            match &shared.state {
                OrchestratorState::Connected(current) if *current == device => {}
                _ => return,
            }
            if !fully_dropped && !policy.reconnect_on_partial_disconnect {
                info!("{} lost {} but is still partially connected", device.address, profile);
                return;
            }
            info!("{} disconnected, reconnecting", device.address);
            shared.state = OrchestratorState::Idle;
            shared.current = None;
            shared.retry_count = 0;
            shared.status = Status::Idle;
            shared.status.clone()
        };
        self.inner.sink.on_status_changed(&dropped);
        self.request_cycle();
    }

    async fn run_attempt_cycle(&self) {
        let policy = &self.inner.policy;
        let (epoch, state, retry_count) = {
            let shared = self.lock_shared();
            (shared.epoch, shared.state.clone(), shared.retry_count)
        };
        debug!("Attempt cycle: state={:?} retries={}", state, retry_count);

        if let OrchestratorState::Connected(device) = &state {
            if policy.is_fully_connected(&self.handles(), device) {
                debug!("{} still connected, nothing to do", device.address);
                return;
            }
        }

        if retry_count >= policy.retry_limit {
            info!("Giving up after {} failed attempts", retry_count);
            self.transition_in(epoch, |shared| {
                shared.state = OrchestratorState::Exhausted;
                shared.current = None;
                Some(Status::Exhausted)
            });
            return;
        }

        let adapter = &self.inner.adapter;
        if !adapter.is_enabled() {
            debug!("Adapter is off, nothing to do");
            self.transition_in(epoch, |shared| {
                shared.state = OrchestratorState::Idle;
                shared.current = None;
                Some(Status::Idle)
            });
            return;
        }
        if !adapter.has_connect_permission() {
            error!("Connect permission missing, stopping");
            self.shutdown();
            return;
        }

        let handles = self.handles();
        if !handles.all_bound(&policy.required_profiles) {
            info!("Profile proxies not ready yet");
            self.fail_cycle(epoch);
            return;
        }

        if let Some(device) = self.find_fully_connected(&handles) {
            info!("Adopting already connected {}", device.address);
            self.on_device_connected(epoch, device);
            return;
        }

        let candidates = select_candidates(&adapter.bonded_devices(), &handles, policy);
        if candidates.is_empty() {
            info!("No audio device to connect to");
            self.fail_cycle(epoch);
            return;
        }

        if !self.transition_in(epoch, |shared| {
            shared.state = OrchestratorState::Attempting;
            Some(Status::Scanning)
        }) {
            return;
        }
        for device in candidates {
            match self.connect_device(epoch, &device).await {
                DialOutcome::Connected => return,
                DialOutcome::Fatal => {
                    self.shutdown();
                    return;
                }
                DialOutcome::Failed => debug!("Could not connect {}", device.address),
            }
        }
        self.fail_cycle(epoch);
    }

    /// First device connected over the bound profiles that meets the
    /// fully-connected requirement
    fn find_fully_connected(&self, handles: &ProfileHandles) -> Option<Device> {
        let policy = &self.inner.policy;
        let mut seen: Vec<Device> = Vec::new();
        for kind in &policy.required_profiles {
            for device in handles.connected_devices(*kind) {
                if !seen.contains(&device) {
                    seen.push(device);
                }
            }
        }
        seen.into_iter().find(|device| policy.is_fully_connected(handles, device))
    }

    async fn connect_device(&self, epoch: u64, device: &Device) -> DialOutcome {
        let policy = &self.inner.policy;

        let connecting = {
            let mut shared = self.lock_shared();
            if shared.epoch != epoch {
                return DialOutcome::Failed;
            }
            if let Some(current) = &shared.current {
                if current != device {
                    warn!(
                        "Not connecting {} while {} is current",
                        device.address, current.address
                    );
                    return DialOutcome::Failed;
                }
            }
            shared.current = Some(device.clone());
            shared.status = Status::Connecting(device.clone());
            shared.status.clone()
        };
        info!("{}", connecting);
        self.inner.sink.on_status_changed(&connecting);

        for kind in policy.dial_sequence() {
            let handles = self.handles();
            if handles.is_connected(kind, device) {
                debug!("{} already connected over {}", device.address, kind);
                continue;
            }
            match self.try_profile_connect(epoch, &handles, kind, device).await {
                Ok(true) => {}
                Ok(false) => {
                    if policy.attempt_success == Requirement::All {
                        break;
                    }
                }
                Err(_) => return DialOutcome::Fatal,
            }
        }

        let handles = self.handles();
        let connected = policy
            .attempt_success
            .is_met(&policy.required_profiles, |kind| handles.is_connected(kind, device));
        if connected {
            self.on_device_connected(epoch, device.clone());
            DialOutcome::Connected
        } else {
            let mut shared = self.lock_shared();
            if shared.epoch == epoch && shared.current.as_ref() == Some(device) {
                shared.current = None;
            }
            DialOutcome::Failed
        }
    }

    /// Dial one profile and wait for the handshake. Only a revoked permission
    /// is an error; everything else is reported as not connected.
    async fn try_profile_connect(
        &self,
        epoch: u64,
        handles: &ProfileHandles,
        kind: ProfileKind,
        device: &Device,
    ) -> Result<bool, ProfileError> {
        let Some(handle) = handles.get(kind) else {
            debug!("{} proxy gone, skipping", kind);
            return Ok(false);
        };

        // an aborted cycle may still be mid-poll on another thread
        if self.lock_shared().epoch != epoch {
            debug!("Cycle cancelled, not dialling {} on {}", device.address, kind);
            return Ok(false);
        }

        info!("Connecting {} to {}", kind, device.address);
        match handle.connect(device) {
            Ok(true) => {}
            Ok(false) => {
                warn!("{} connect to {} was not accepted", kind, device.address);
                return Ok(false);
            }
            Err(ProfileError::PermissionRevoked) => {
                error!("{} connect to {}: permission revoked", kind, device.address);
                return Err(ProfileError::PermissionRevoked);
            }
            Err(e) => {
                warn!("{} connect to {} failed: {}", kind, device.address, e);
                return Ok(false);
            }
        }

        let deadline = Instant::now() + self.inner.policy.connect_timeout;
        let mut handshake_started = false;
        loop {
            let listener = self.inner.signal.listen();
            match handle.connection_state(device) {
                ConnectionState::Connected => {
                    info!("{} connected to {}", kind, device.address);
                    return Ok(true);
                }
                ConnectionState::Connecting => handshake_started = true,
                ConnectionState::Disconnected if handshake_started => {
                    warn!("{} handshake with {} failed", kind, device.address);
                    break;
                }
                ConnectionState::Disconnected => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || listener.wait(remaining).await == WaitOutcome::TimedOut {
                // the notification may have been lost
                if handle.connection_state(device) == ConnectionState::Connected {
                    info!("{} connected to {}", kind, device.address);
                    return Ok(true);
                }
                warn!("{} handshake with {} timed out", kind, device.address);
                break;
            }
        }

        match handle.disconnect(device) {
            Ok(true) => debug!("Cancelled {} handshake with {}", kind, device.address),
            Ok(false) => warn!("{} disconnect of {} was not accepted", kind, device.address),
            Err(e) => warn!("{} disconnect of {} failed: {}", kind, device.address, e),
        }
        Ok(false)
    }

    fn on_device_connected(&self, epoch: u64, device: Device) {
        if self.transition_in(epoch, |shared| {
            shared.state = OrchestratorState::Connected(device.clone());
            shared.current = Some(device.clone());
            shared.retry_count = 0;
            Some(Status::Connected(device))
        }) {
            self.inner.retry.cancel();
        }
    }

    /// Count a failed cycle and schedule the next one
    fn fail_cycle(&self, epoch: u64) {
        let counted = self.transition_in(epoch, |shared| {
            shared.retry_count = shared.retry_count.saturating_add(1);
            shared.state = OrchestratorState::Idle;
            shared.current = None;
            Some(Status::Idle)
        });
        if counted {
            self.schedule_retry();
        }
    }

    fn schedule_retry(&self) {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.retry.arm(&self.inner.runtime, self.inner.policy.retry_delay, move || {
            if let Some(inner) = inner.upgrade() {
                debug!("Retry timer fired");
                Orchestrator { inner }.request_cycle();
            }
        });
    }

    fn clear_failures(&self) {
        self.transition(|shared| {
            shared.retry_count = 0;
            if shared.state == OrchestratorState::Exhausted {
                shared.state = OrchestratorState::Idle;
                return Some(Status::Idle);
            }
            None
        });
    }

    fn abort_worker(&self) {
        let worker = self.inner.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if worker.is_some() {
            // the aborted task releases its ticket only once it is dropped
            self.inner.in_flight.store(0, Ordering::SeqCst);
            debug!("Aborted attempt cycle");
        }
        drop(worker);
    }

    /// Apply a change to the shared state and report the new status, if any
    fn transition(&self, f: impl FnOnce(&mut Shared) -> Option<Status>) {
        let status = {
            let mut shared = self.lock_shared();
            let status = f(&mut shared);
            if let Some(status) = &status {
                shared.status = status.clone();
            }
            status
        };
        if let Some(status) = status {
            info!("Status: {}", status);
            self.inner.sink.on_status_changed(&status);
        }
    }

    /// Like [`Self::transition`], but only while `epoch` is current. Returns
    /// whether the change was applied.
    fn transition_in(&self, epoch: u64, f: impl FnOnce(&mut Shared) -> Option<Status>) -> bool {
        let mut applied = false;
        self.transition(|shared| {
            if shared.epoch != epoch {
                debug!("Dropping update from a cancelled cycle");
                return None;
            }
            applied = true;
            f(shared)
        });
        applied
    }

    fn handles(&self) -> ProfileHandles {
        self.lock_handles().clone()
    }

    fn lock_handles(&self) -> MutexGuard<'_, ProfileHandles> {
        self.inner.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
