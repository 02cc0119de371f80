//! Tunables of the reconnection behaviour.
//!
//! Known deployments disagree on what "connected" means, which profile is
//! dialled first, and how often to retry, so all of it lives in one record.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{
    core::device::Device,
    profile::{ProfileHandles, ProfileKind},
};

/// Number of failed attempt cycles after which we stop retrying
pub const DEFAULT_RETRY_LIMIT: u32 = 2;
/// How long to wait for the platform to confirm one profile handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Delay before a failed attempt cycle is re-run
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);

/// How many of the required profiles must be connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    /// Every required profile
    All,
    /// At least one required profile
    Any,
}

impl Requirement {
    /// Evaluate the requirement given a per-profile connectedness predicate
    pub fn is_met(&self, required: &[ProfileKind], connected: impl Fn(ProfileKind) -> bool) -> bool {
        match self {
            Requirement::All => required.iter().all(|kind| connected(*kind)),
            Requirement::Any => required.iter().any(|kind| connected(*kind)),
        }
    }
}

/// The reconnection policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionPolicy {
    /// Profiles that must be bound before attempting, and that are dialled
    pub required_profiles: Vec<ProfileKind>,
    /// Order in which the required profiles are dialled
    pub dial_order: Vec<ProfileKind>,
    /// When a device counts as fully connected: steady state, adoption of an
    /// already connected device, and exclusion from the candidates
    pub fully_connected: Requirement,
    /// When a dial round towards one device counts as a success
    pub attempt_success: Requirement,
    pub retry_limit: u32,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    #[serde(rename = "retry_delay_ms", with = "duration_ms")]
    pub retry_delay: Duration,
    /// Re-attempt when the current device drops one profile but keeps another
    pub reconnect_on_partial_disconnect: bool,
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            required_profiles: vec![ProfileKind::Call, ProfileKind::Media],
            dial_order: vec![ProfileKind::Call, ProfileKind::Media],
            fully_connected: Requirement::All,
            attempt_success: Requirement::Any,
            retry_limit: DEFAULT_RETRY_LIMIT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_delay: DEFAULT_RETRY_DELAY,
            reconnect_on_partial_disconnect: false,
        }
    }
}

impl ConnectionPolicy {
    /// Reject policies the orchestrator cannot act on
    pub fn validate(&self) -> Result<()> {
        if self.required_profiles.is_empty() {
            bail!("at least one profile must be required");
        }
        if self.connect_timeout.is_zero() {
            bail!("connect timeout must be positive");
        }
        Ok(())
    }

    /// The required profiles in dial order, without duplicates. Required
    /// profiles missing from `dial_order` are dialled last.
    pub fn dial_sequence(&self) -> Vec<ProfileKind> {
        let mut sequence: Vec<ProfileKind> = Vec::new();
        for kind in self.dial_order.iter().chain(self.required_profiles.iter()) {
            if self.required_profiles.contains(kind) && !sequence.contains(kind) {
                sequence.push(*kind);
            }
        }
        sequence
    }

    /// Whether the device is connected enough to leave it alone
    pub fn is_fully_connected(&self, handles: &ProfileHandles, device: &Device) -> bool {
        self.fully_connected
            .is_met(&self.required_profiles, |kind| handles.is_connected(kind, device))
    }

    /// Whether no required profile is connected to the device anymore
    pub fn is_fully_dropped(&self, handles: &ProfileHandles, device: &Device) -> bool {
        !Requirement::Any.is_met(&self.required_profiles, |kind| handles.is_connected(kind, device))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
