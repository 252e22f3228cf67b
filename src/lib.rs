//! Cube Touch heartbeat monitor
//!
//! Listens for UDP heartbeats from Cube Touch devices, tracks which devices
//! are online, and measures their latency. `HeartbeatMonitor` is the entry
//! point; everything else is reachable through it or usable on its own.

pub mod cli;
pub mod config;
pub mod constants;
pub mod device;
pub mod display;
pub mod error;
pub mod listener;
pub mod logging;
pub mod monitor;
pub mod probe;
pub mod prober;
pub mod protocol;
pub mod registry;
pub mod sweeper;

pub use config::Config;
pub use device::{DeviceKey, DeviceRecord, LatencyClass};
pub use error::{HeartbeatError, Result};
pub use monitor::{HeartbeatMonitor, MonitorStatistics};
pub use probe::{LatencyProbe, PingProbe};
pub use registry::{FleetEvent, FleetRegistry, FleetSnapshot, FleetStatistics};
