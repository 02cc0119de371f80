//! A broadcast wakeup carrying "some connection state changed" from the
//! platform to whoever is waiting on a handshake.
//!
//! Every call to [`EventSignal::notify_all`] wakes all listeners that exist at
//! that moment, exactly once. Nothing is queued: a notification without
//! listeners is lost. Listeners must therefore re-query the real state after
//! waking instead of trusting the wakeup.

use std::time::Duration;

use tokio::sync::{futures::Notified, Notify};

/// Result of waiting on an [`EventSignal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signalled,
    TimedOut,
}

#[derive(Debug, Default)]
pub struct EventSignal {
    notify: Notify,
}

impl EventSignal {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every current listener
    pub fn notify_all(&self) {
        self.notify.notify_waiters();
    }

    /// Register interest now. Notifications sent after this call and before
    /// the returned listener is awaited are not missed.
    pub fn listen(&self) -> Listener<'_> {
        Listener(self.notify.notified())
    }

    /// Wait for the next notification, at most `timeout`
    pub async fn wait(&self, timeout: Duration) -> WaitOutcome {
        self.listen().wait(timeout).await
    }
}

/// A registered interest in the next notification
pub struct Listener<'a>(Notified<'a>);

impl<'a> Listener<'a> {
    pub async fn wait(self, timeout: Duration) -> WaitOutcome {
        match tokio::time::timeout(timeout, self.0).await {
            Ok(()) => WaitOutcome::Signalled,
            Err(_) => WaitOutcome::TimedOut,
        }
    }
}
