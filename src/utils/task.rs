//! Helpers for driving async code in tests with a frozen clock

use std::{future::Future, time::Duration};

use log::LevelFilter;
use tokio::{
    runtime::Builder,
    select,
    task::{spawn_local, LocalSet},
};

use crate::logging::init_logging;

/// Run the supplied future on a single-threaded runtime whose clock is paused.
/// Whenever every task is idle the clock jumps to the next timer, so connect
/// timeouts and retry delays elapse instantly and in a deterministic order.
pub fn block_on_locally<T>(f: impl Future<Output = T>) -> T {
    init_logging(LevelFilter::Debug);
    let rt = Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("failed to build test runtime");

    LocalSet::new().block_on(&rt, async move {
        select! {
            t = f => t,
            // must be LONGER than any retry schedule a test goes through
            _ = tokio::time::sleep(Duration::from_secs(100000)) => {
                panic!("test appears to be stuck");
            },
        }
    })
}

/// Spawn the future, give it a chance to run, and report whether it already
/// completed. Returns Ok(T) if so, otherwise Err with a future that resolves
/// once the (still running) task completes.
///
/// Forces a particular interleaving in tests, rather than letting
/// spawn_local poll the task at *some* later point.
///
/// MUST only be run on a runtime with a paused clock.
pub async fn try_await<T: 'static>(
    f: impl Future<Output = T> + 'static,
) -> Result<T, impl Future<Output = T>> {
    let mut handle = spawn_local(f);

    select! {
        t = &mut handle => Ok(t.expect("task under test panicked")),
        // must be SHORTER than any delay used by the orchestrator
        _ = tokio::time::sleep(Duration::from_millis(10)) => {
            Err(async { handle.await.expect("task under test panicked") })
        },
    }
}
