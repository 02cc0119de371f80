//! The delayed re-run of a failed attempt cycle.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use log::debug;
use tokio::runtime::Handle;

use crate::utils::owned_handle::OwnedHandle;

/// Holds at most one armed timer. Arming replaces (and thereby aborts) the
/// previous one.
#[derive(Debug, Default)]
pub struct RetryTimer {
    pending: Mutex<Option<OwnedHandle<()>>>,
}

impl RetryTimer {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` once `delay` has elapsed, unless cancelled or re-armed
    /// before then.
    pub fn arm(&self, runtime: &Handle, delay: Duration, on_fire: impl FnOnce() + Send + 'static) {
        debug!("retry armed in {:?}", delay);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        let previous = self.lock().replace(task.into());
        drop(previous);
    }

    /// Disarm the timer, if any
    pub fn cancel(&self) {
        if self.lock().take().is_some() {
            debug!("retry cancelled");
        }
    }

    /// Whether a timer is armed and has not fired yet
    pub fn is_armed(&self) -> bool {
        self.lock().as_ref().map_or(false, |task| !task.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<OwnedHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
