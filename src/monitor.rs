//! Heartbeat monitor
//!
//! Owns the registry and the three workers (listener, sweeper, prober) and
//! exposes the query surface used by presentation layers.
//!
//! ```text
//!   UDP :1509 ──► HeartbeatListener ──┐
//!                                     ├──► FleetRegistry ──► FleetEvent subscribers
//!   LivenessSweeper (every 1 s) ──────┤
//!   LatencyProber   (every 10 s) ─────┘
//! ```

use crate::config::Config;
use crate::constants::WORKER_JOIN_TIMEOUT_MS;
use crate::device::DeviceRecord;
use crate::error::{HeartbeatError, Result};
use crate::listener::HeartbeatListener;
use crate::probe::{LatencyProbe, PingProbe};
use crate::prober::LatencyProber;
use crate::registry::{FleetEvent, FleetRegistry, FleetSnapshot, FleetStatistics};
use crate::sweeper::LivenessSweeper;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fleet counts plus monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatistics {
    #[serde(flatten)]
    pub fleet: FleetStatistics,
    pub heartbeat_port: u16,
    pub timeout_ms: u64,
    pub is_running: bool,
}

/// Running workers and their shutdown signal
struct Workers {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    local_addr: SocketAddr,
}

/// Device liveness monitor
pub struct HeartbeatMonitor<P: LatencyProbe = PingProbe> {
    config: Config,
    registry: Arc<FleetRegistry>,
    probe: Arc<P>,
    workers: Option<Workers>,
}

impl HeartbeatMonitor<PingProbe> {
    /// Monitor using the system `ping` tool for latency
    pub fn new(config: Config) -> Self {
        Self::with_probe(config, PingProbe::new())
    }
}

impl<P: LatencyProbe> HeartbeatMonitor<P> {
    pub fn with_probe(config: Config, probe: P) -> Self {
        Self {
            config,
            registry: Arc::new(FleetRegistry::new()),
            probe: Arc::new(probe),
            workers: None,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind the heartbeat port and spawn the workers
    ///
    /// Must be called from within a tokio runtime. Returns the bound address;
    /// calling it again while running returns the same address. An invalid
    /// config or a bind failure leaves the monitor stopped.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if let Some(workers) = &self.workers {
            return Ok(workers.local_addr);
        }

        self.config.validate()?;
        let requested = self.config.listener.socket_addr()?;
        let listener = HeartbeatListener::bind(&self.config.listener, self.registry.clone())?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| HeartbeatError::UdpBind {
                addr: requested,
                source,
            })?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(3);

        tasks.push(("listener", tokio::spawn(listener.run(shutdown_rx.clone()))));

        let sweeper = LivenessSweeper::new(self.registry.clone(), &self.config.liveness);
        tasks.push(("sweeper", tokio::spawn(sweeper.run(shutdown_rx.clone()))));

        if self.config.probe.enabled {
            let prober = LatencyProber::new(
                self.registry.clone(),
                self.probe.clone(),
                &self.config.probe,
            );
            tasks.push(("prober", tokio::spawn(prober.run(shutdown_rx))));
        } else {
            debug!("Latency probing disabled");
        }

        info!(
            "Heartbeat monitor started on {} (timeout {} ms)",
            local_addr, self.config.liveness.timeout_ms
        );

        self.workers = Some(Workers {
            shutdown,
            tasks,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Signal shutdown and wait for every worker
    ///
    /// A worker that does not finish within the join timeout is aborted.
    /// Safe to call when already stopped.
    pub async fn stop(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };

        let _ = workers.shutdown.send(true);
        let join_timeout = Duration::from_millis(WORKER_JOIN_TIMEOUT_MS);

        for (name, mut handle) in workers.tasks {
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => debug!("{} joined", name),
                Ok(Err(e)) => warn!("{} task ended abnormally: {}", name, e),
                Err(_) => {
                    warn!("{} did not stop within {:?}, aborting", name, join_timeout);
                    handle.abort();
                }
            }
        }

        info!("Heartbeat monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    /// Bound heartbeat address while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.workers.as_ref().map(|w| w.local_addr)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.registry.subscribe()
    }

    /// Snapshot of every known device
    pub fn all_devices_status(&self) -> FleetSnapshot {
        self.registry.snapshot()
    }

    pub fn statistics(&self) -> FleetStatistics {
        self.registry.statistics()
    }

    pub fn monitor_statistics(&self) -> MonitorStatistics {
        MonitorStatistics {
            fleet: self.registry.statistics(),
            heartbeat_port: self
                .local_addr()
                .map(|addr| addr.port())
                .unwrap_or(self.config.listener.port),
            timeout_ms: self.config.liveness.timeout_ms,
            is_running: self.is_running(),
        }
    }

    /// Forget every offline device
    pub fn prune_offline(&self) -> usize {
        self.registry.prune_offline()
    }

    pub fn find_by_name(&self, name: &str) -> Option<DeviceRecord> {
        self.registry.find_by_name(name)
    }

    pub fn find_by_address(&self, address: IpAddr) -> Option<DeviceRecord> {
        self.registry.find_by_address(address)
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl<P: LatencyProbe> Drop for HeartbeatMonitor<P> {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.take() {
            // Workers exit on their own; nothing left to join from here
            let _ = workers.shutdown.send(true);
        }
    }
}
