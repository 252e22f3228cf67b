//! Fleet registry
//!
//! Single owner of all device records. The listener, sweeper and prober
//! only ever touch records through these operations, and every operation
//! runs inside one critical section so a snapshot never sees a record
//! mid-update.
//!
//! Events are fanned out on a broadcast channel after the lock is released.

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::device::{DeviceKey, DeviceRecord};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Online/offline counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FleetStatistics {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

/// Point-in-time copy of every record, ordered by identity key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub taken_at: DateTime<Local>,
    pub devices: Vec<DeviceRecord>,
}

impl FleetSnapshot {
    pub fn statistics(&self) -> FleetStatistics {
        let online = self.devices.iter().filter(|d| d.is_online).count();
        FleetStatistics {
            total: self.devices.len(),
            online,
            offline: self.devices.len() - online,
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Notification delivered to subscribers
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// Something changed (or a periodic refresh is due); carries the full state
    StatusChanged(Arc<FleetSnapshot>),
    /// First heartbeat for a new identity
    DeviceDiscovered(DeviceRecord),
    /// A device was marked offline by the liveness sweep
    DeviceOffline(DeviceRecord),
}

/// Shared collection of device records
pub struct FleetRegistry {
    devices: Mutex<BTreeMap<DeviceKey, DeviceRecord>>,
    events: broadcast::Sender<FleetEvent>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            devices: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Receive all events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Record a heartbeat for `(name, address)` received now
    pub fn upsert(&self, name: &str, address: IpAddr) -> DeviceRecord {
        self.upsert_at(name, address, Local::now())
    }

    /// Record a heartbeat received at `now`
    ///
    /// Creates the record on first sight (firing `DeviceDiscovered`), then
    /// renews it. Always fires exactly one `StatusChanged`.
    pub fn upsert_at(&self, name: &str, address: IpAddr, now: DateTime<Local>) -> DeviceRecord {
        let key = DeviceKey::new(name, address);

        let (record, discovered, snapshot) = {
            let mut devices = self.devices.lock();
            let mut discovered = None;
            let record = devices.entry(key).or_insert_with_key(|key| {
                let record = DeviceRecord::new(key, now);
                discovered = Some(record.clone());
                record
            });
            record.record_heartbeat(now);
            let record = record.clone();
            (record, discovered, Self::snapshot_of(&devices, now))
        };

        if let Some(new_device) = discovered {
            info!("New device found: {} ({})", new_device.name, new_device.address);
            self.emit(FleetEvent::DeviceDiscovered(new_device));
        }
        debug!(
            "Heartbeat from {} ({}) #{}",
            record.name, record.address, record.heartbeat_count
        );
        self.emit(FleetEvent::StatusChanged(Arc::new(snapshot)));

        record
    }

    /// Store a latency measurement; liveness is left untouched
    ///
    /// Returns `false` if no such device exists (e.g. pruned mid-probe).
    pub fn update_latency(&self, name: &str, address: IpAddr, latency_ms: f64) -> bool {
        let key = DeviceKey::new(name, address);
        let mut devices = self.devices.lock();
        match devices.get_mut(&key) {
            Some(record) => {
                record.record_latency(latency_ms);
                true
            }
            None => false,
        }
    }

    /// Mark devices silent for longer than `timeout` as offline
    pub fn sweep_timeouts(&self, timeout: Duration) -> bool {
        self.sweep_timeouts_at(timeout, Local::now())
    }

    /// Liveness sweep evaluated at `now`
    ///
    /// Fires one `DeviceOffline` per transition and returns whether any
    /// transition occurred. Already-offline devices are not reported again.
    pub fn sweep_timeouts_at(&self, timeout: Duration, now: DateTime<Local>) -> bool {
        let went_offline: Vec<DeviceRecord> = {
            let mut devices = self.devices.lock();
            devices
                .values_mut()
                .filter(|record| record.is_online && record.is_expired(timeout, now))
                .map(|record| {
                    record.is_online = false;
                    record.clone()
                })
                .collect()
        };

        for record in &went_offline {
            warn!("Device {} ({}) went OFFLINE", record.name, record.address);
            self.emit(FleetEvent::DeviceOffline(record.clone()));
        }

        !went_offline.is_empty()
    }

    /// Remove every offline record, returning how many were removed
    pub fn prune_offline(&self) -> usize {
        let (removed, snapshot) = {
            let mut devices = self.devices.lock();
            let before = devices.len();
            devices.retain(|key, record| {
                if !record.is_online {
                    info!("Removing offline device: {}", key);
                }
                record.is_online
            });
            (before - devices.len(), Self::snapshot_of(&devices, Local::now()))
        };

        if removed > 0 {
            self.emit(FleetEvent::StatusChanged(Arc::new(snapshot)));
        }
        removed
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Consistent copy of all records
    pub fn snapshot(&self) -> FleetSnapshot {
        let devices = self.devices.lock();
        Self::snapshot_of(&devices, Local::now())
    }

    pub fn statistics(&self) -> FleetStatistics {
        let devices = self.devices.lock();
        let online = devices.values().filter(|d| d.is_online).count();
        FleetStatistics {
            total: devices.len(),
            online,
            offline: devices.len() - online,
        }
    }

    /// Identity keys of every device currently online
    pub fn online_devices(&self) -> Vec<DeviceKey> {
        self.devices
            .lock()
            .iter()
            .filter(|(_, record)| record.is_online)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// First device (in key order) with the given name
    pub fn find_by_name(&self, name: &str) -> Option<DeviceRecord> {
        self.devices
            .lock()
            .values()
            .find(|record| record.name == name)
            .cloned()
    }

    /// First device (in key order) with the given address
    pub fn find_by_address(&self, address: IpAddr) -> Option<DeviceRecord> {
        self.devices
            .lock()
            .values()
            .find(|record| record.address == address)
            .cloned()
    }

    pub fn get(&self, key: &DeviceKey) -> Option<DeviceRecord> {
        self.devices.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }

    // =========================================================================
    // Notification
    // =========================================================================

    /// Send a `StatusChanged` carrying a fresh snapshot
    pub fn notify_status_changed(&self) -> Arc<FleetSnapshot> {
        let snapshot = Arc::new(self.snapshot());
        self.emit(FleetEvent::StatusChanged(snapshot.clone()));
        snapshot
    }

    fn snapshot_of(devices: &BTreeMap<DeviceKey, DeviceRecord>, now: DateTime<Local>) -> FleetSnapshot {
        FleetSnapshot {
            taken_at: now,
            devices: devices.values().cloned().collect(),
        }
    }

    fn emit(&self, event: FleetEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }
}

impl Default for FleetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
