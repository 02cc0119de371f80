//! Reading the reconnection settings from disk.
//!
//! The file is a single JSON object. Policy keys sit at the top level next to
//! an optional `log_level`:
//!
//! ```json
//! { "log_level": "debug", "retry_limit": 3, "dial_order": ["media", "call"] }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use log::{warn, LevelFilter};
use serde_json::Value;

use crate::connection::policy::ConnectionPolicy;

/// File to store the config for the autoconnect service
pub const AUTOCONNECT_CONF: &str = "/var/lib/bluetooth/autoconnect.json";

pub fn read_config<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
    std::fs::read_to_string(path)
}

/// Log level from the config file, if present and valid
pub fn get_log_level<P: AsRef<Path>>(path: P) -> Option<LevelFilter> {
    get_log_level_internal(read_config(path).ok()?)
}

fn get_log_level_internal(config: String) -> Option<LevelFilter> {
    serde_json::from_str::<Value>(config.as_str())
        .ok()?
        .get("log_level")?
        .as_str()?
        .parse::<LevelFilter>()
        .ok()
}

/// Parse and validate the policy in the config file. Unknown keys (such as
/// `log_level`) are ignored; missing keys take their defaults.
pub fn read_policy<P: AsRef<Path>>(path: P) -> Result<ConnectionPolicy> {
    let path = path.as_ref();
    let config = read_config(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    parse_policy(config.as_str()).with_context(|| format!("invalid config {}", path.display()))
}

fn parse_policy(config: &str) -> Result<ConnectionPolicy> {
    let policy: ConnectionPolicy = serde_json::from_str(config)?;
    policy.validate()?;
    Ok(policy)
}

/// Like [`read_policy`], but falls back to the default policy when the file is
/// missing or unusable.
pub fn load_policy<P: AsRef<Path>>(path: P) -> ConnectionPolicy {
    let path = path.as_ref();
    if !path.exists() {
        return ConnectionPolicy::default();
    }
    match read_policy(path) {
        Ok(policy) => policy,
        Err(e) => {
            warn!("{:#}, using default policy", e);
            ConnectionPolicy::default()
        }
    }
}
