//! Configuration management
//!
//! Config file is `config.toml`, looked up next to the executable and then
//! in the working directory. Every field has a default, so partial files
//! are fine.

use crate::constants::{
    DEFAULT_BIND_ADDRESS, DEFAULT_HEARTBEAT_PORT, DEFAULT_PROBE_INTERVAL_MS,
    DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REFRESH_INTERVAL_MS, DEFAULT_SWEEP_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};
use crate::error::{HeartbeatError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

// =============================================================================
// Application Configuration
// =============================================================================

/// Application configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listener: ListenerConfig,
    pub liveness: LivenessConfig,
    pub probe: ProbeConfig,
}

/// Heartbeat listener socket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Local address to bind ("0.0.0.0" = all interfaces)
    pub bind_address: String,
    /// UDP port devices send heartbeats to (0 = pick a free port)
    pub port: u16,
}

/// Online/offline evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Silence after which a device is marked offline
    pub timeout_ms: u64,
    /// How often liveness is re-evaluated
    pub sweep_interval_ms: u64,
    /// Minimum interval between refresh-only notifications (0 = never)
    pub refresh_interval_ms: u64,
}

/// Periodic latency measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    /// Interval between probe passes
    pub interval_ms: u64,
    /// Upper bound for a single probe
    pub timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_HEARTBEAT_PORT,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }
}

impl ListenerConfig {
    /// Socket address to bind
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .bind_address
            .trim()
            .parse()
            .map_err(|_| HeartbeatError::InvalidBindAddress {
                value: self.bind_address.clone(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl LivenessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// `None` when refresh-only notifications are disabled
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_ms > 0).then(|| Duration::from_millis(self.refresh_interval_ms))
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Check values that would make the workers misbehave
    pub fn validate(&self) -> Result<()> {
        self.listener.socket_addr()?;

        if self.liveness.timeout_ms == 0 {
            return Err(HeartbeatError::ConfigValidation {
                field: "liveness.timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.liveness.sweep_interval_ms == 0 {
            return Err(HeartbeatError::ConfigValidation {
                field: "liveness.sweep_interval_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.liveness.timeout_ms < self.liveness.sweep_interval_ms {
            return Err(HeartbeatError::ConfigValidation {
                field: "liveness.timeout_ms",
                reason: format!(
                    "{} ms is shorter than the sweep interval ({} ms)",
                    self.liveness.timeout_ms, self.liveness.sweep_interval_ms
                ),
            });
        }

        if self.probe.enabled {
            if self.probe.interval_ms == 0 {
                return Err(HeartbeatError::ConfigValidation {
                    field: "probe.interval_ms",
                    reason: "must be greater than zero".into(),
                });
            }
            if self.probe.timeout_ms == 0 {
                return Err(HeartbeatError::ConfigValidation {
                    field: "probe.timeout_ms",
                    reason: "must be greater than zero".into(),
                });
            }
        }

        Ok(())
    }
}

// =============================================================================
// Loading / saving
// =============================================================================

/// Candidate config locations, in lookup order
///
/// 1. Next to the executable (deployed install)
/// 2. Current working directory (dev runs)
pub fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join(CONFIG_FILE_NAME));
    }

    candidates
}

/// Parse config from a TOML string
pub fn parse(content: &str, path: &Path) -> Result<Config> {
    toml::from_str(content).map_err(|e| HeartbeatError::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load config from an explicit path (errors are returned)
pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| HeartbeatError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&content, path)
}

/// Load config from the first existing candidate, or use defaults
///
/// Unreadable or invalid files are reported and skipped rather than fatal.
pub fn load() -> Config {
    let Some(path) = config_candidates().into_iter().find(|p| p.exists()) else {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        return Config::default();
    };

    match load_from(&path) {
        Ok(config) => {
            debug!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}, using defaults", e);
            Config::default()
        }
    }
}

/// Render config as pretty TOML
pub fn to_toml(config: &Config) -> String {
    // Config is always serializable (all fields are serde-compatible)
    toml::to_string_pretty(config).unwrap_or_default()
}

/// Save config to file
pub fn save(path: &Path, config: &Config) -> Result<()> {
    fs::write(path, to_toml(config)).map_err(|e| HeartbeatError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })
}

// ============================================================================
// Tests
// ============================================================================
