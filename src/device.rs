//! Device records
//!
//! One `DeviceRecord` per `(name, address)` identity. Records are plain data:
//! the registry owns the live copies, everything handed out is a snapshot.

use crate::constants::{LATENCY_FAIR_MAX_MS, LATENCY_GOOD_MAX_MS};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Identity of a device
///
/// Neither the name nor the address alone is unique: names may collide and
/// addresses get reassigned by DHCP.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    pub name: String,
    pub address: IpAddr,
}

impl DeviceKey {
    pub fn new(name: impl Into<String>, address: IpAddr) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Coarse latency bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LatencyClass {
    /// Never probed
    #[default]
    Unknown,
    Good,
    Fair,
    Poor,
    /// Probe timed out or device unreachable
    Timeout,
}

impl LatencyClass {
    /// Classify a measured latency
    ///
    /// Negative values are the timeout sentinel. Bounds are inclusive:
    /// 50 ms is still Good, 150 ms is still Fair.
    pub fn classify(latency_ms: f64) -> Self {
        if latency_ms < 0.0 {
            Self::Timeout
        } else if latency_ms <= LATENCY_GOOD_MAX_MS {
            Self::Good
        } else if latency_ms <= LATENCY_FAIR_MAX_MS {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    /// Classify an optional latency (`None` = never probed)
    pub fn from_latency(latency_ms: Option<f64>) -> Self {
        latency_ms.map(Self::classify).unwrap_or_default()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::Timeout => "Timeout",
        }
    }
}

impl fmt::Display for LatencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-device liveness state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub address: IpAddr,
    /// First heartbeat ever received for this identity
    pub first_seen: DateTime<Local>,
    /// Most recent heartbeat
    pub last_heartbeat: DateTime<Local>,
    pub is_online: bool,
    pub heartbeat_count: u64,
    /// Last measured round-trip time; `None` until probed, negative on timeout
    pub latency_ms: Option<f64>,
    pub latency_class: LatencyClass,
}

impl DeviceRecord {
    /// Fresh record for a device seen for the first time at `now`
    ///
    /// Starts offline with zero heartbeats; the caller records the heartbeat
    /// that caused the discovery.
    pub fn new(key: &DeviceKey, now: DateTime<Local>) -> Self {
        Self {
            name: key.name.clone(),
            address: key.address,
            first_seen: now,
            last_heartbeat: now,
            is_online: false,
            heartbeat_count: 0,
            latency_ms: None,
            latency_class: LatencyClass::Unknown,
        }
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.name.clone(), self.address)
    }

    /// Record a heartbeat received at `now`
    pub fn record_heartbeat(&mut self, now: DateTime<Local>) {
        self.last_heartbeat = now;
        self.is_online = true;
        self.heartbeat_count += 1;
    }

    /// Store a latency measurement and recompute the class
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.latency_ms = Some(latency_ms);
        self.latency_class = LatencyClass::classify(latency_ms);
    }

    /// Time since the last heartbeat (zero if the clock went backwards)
    pub fn since_last_heartbeat(&self, now: DateTime<Local>) -> Duration {
        (now - self.last_heartbeat).to_std().unwrap_or_default()
    }

    /// Whether the silence since the last heartbeat exceeds `timeout`
    pub fn is_expired(&self, timeout: Duration, now: DateTime<Local>) -> bool {
        self.since_last_heartbeat(now) > timeout
    }

    /// Time since the device was first seen
    pub fn uptime(&self, now: DateTime<Local>) -> Duration {
        (now - self.first_seen).to_std().unwrap_or_default()
    }

    /// Uptime as `HH:MM:SS` (hours keep counting past 24)
    pub fn format_uptime(&self, now: DateTime<Local>) -> String {
        let secs = self.uptime(now).as_secs();
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_online {
            "ONLINE"
        } else {
            "OFFLINE"
        }
    }
}
