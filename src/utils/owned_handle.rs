//! Utility to abort an async task if its logical owner is dropped

use tokio::task::JoinHandle;

/// Owns a spawned task: dropping or replacing the handle aborts the task, so
/// a cancelled timer or worker can never fire late.
#[derive(Debug)]
pub struct OwnedHandle<T> {
    handle: JoinHandle<T>,
}

impl<T> OwnedHandle<T> {
    /// Whether the task has run to completion (or was aborted)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> From<JoinHandle<T>> for OwnedHandle<T> {
    fn from(handle: JoinHandle<T>) -> Self {
        Self { handle }
    }
}

impl<T> Drop for OwnedHandle<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
