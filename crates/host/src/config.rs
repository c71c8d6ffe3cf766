//! Host configuration
//!
//! Loaded from a TOML file; every field has a default so a missing file or
//! a partial file both work. The `[connection]` table maps straight onto
//! [`ConnectionConfig`], the `[driver]` table onto [`DriverTuning`].

use common::{Error, Result};
use driver::DriverTuning;
use protocol::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Default log filter; `RUST_LOG` wins when set
    pub log_level: String,
    /// Seconds between stream statistics log lines; 0 disables them
    pub stats_interval_secs: u64,
    pub connection: ConnectionConfig,
    pub driver: DriverSection,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            stats_interval_secs: 5,
            connection: ConnectionConfig::default(),
            driver: DriverSection::default(),
        }
    }
}

/// `[driver]` table: timing knobs in integer units TOML can carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverSection {
    pub heartbeat_interval_ms: u64,
    pub failure_threshold: u32,
    pub read_timeout_ms: u64,
    pub resync_budget: u32,
    pub wifi_connect_delay_ms: u64,
}

impl Default for DriverSection {
    fn default() -> Self {
        let tuning = DriverTuning::default();
        Self {
            heartbeat_interval_ms: tuning.heartbeat_interval.as_millis() as u64,
            failure_threshold: tuning.failure_threshold,
            read_timeout_ms: tuning.read_timeout.as_millis() as u64,
            resync_budget: tuning.resync_budget,
            wifi_connect_delay_ms: tuning.wifi_connect_delay.as_millis() as u64,
        }
    }
}

impl DriverSection {
    pub fn tuning(&self) -> DriverTuning {
        DriverTuning {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            failure_threshold: self.failure_threshold,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            resync_budget: self.resync_budget,
            wifi_connect_delay: Duration::from_millis(self.wifi_connect_delay_ms),
        }
    }
}

/// Platform config location: `<config dir>/carlink/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("carlink").join("config.toml"))
}

/// Load configuration
///
/// An explicit `path` (tilde-expanded) must exist; with no path, a missing
/// default file just yields the defaults.
pub fn load(path: Option<&str>) -> Result<HostConfig> {
    let path = match path {
        Some(raw) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => {
                debug!("no config file, using defaults");
                return Ok(HostConfig::default());
            }
        },
    };
    let text = std::fs::read_to_string(&path)?;
    let config: HostConfig = toml::from_str(&text)
        .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}
