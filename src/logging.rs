//! Host logger setup

use log::LevelFilter;

/// Inits logging for host. `RUST_LOG` overrides the given level; calling this
/// more than once is harmless.
pub fn init_logging(level: LevelFilter) {
    env_logger::Builder::new()
        .filter(None, level)
        .parse_default_env()
        .try_init()
        .ok();
    log::set_max_level(level)
}
