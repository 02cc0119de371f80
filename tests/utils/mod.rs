use std::future::Future;

use bt_autoconnect::logging::init_logging;
use log::LevelFilter;
use tokio::task::LocalSet;

/// Run a test on a single-threaded runtime with the clock paused, so connect
/// timeouts and retry delays elapse as soon as everything is idle.
pub fn start_test(f: impl Future<Output = ()>) {
    tokio_test::block_on(async move {
        init_logging(LevelFilter::Debug);
        tokio::time::pause();
        LocalSet::new().run_until(f).await;
    });
}
