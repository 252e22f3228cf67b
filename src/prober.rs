//! Latency prober
//!
//! Every probe interval, measures the round trip to each online device and
//! stores the result. Probes within one pass run concurrently; a failing
//! or hanging probe only affects its own device.

use crate::config::ProbeConfig;
use crate::device::DeviceKey;
use crate::probe::{LatencyProbe, ProbeOutcome};
use crate::registry::FleetRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Periodic latency measurement against the shared registry
pub struct LatencyProber<P: LatencyProbe> {
    registry: Arc<FleetRegistry>,
    probe: Arc<P>,
    interval: Duration,
    timeout: Duration,
}

impl<P: LatencyProbe> LatencyProber<P> {
    pub fn new(registry: Arc<FleetRegistry>, probe: Arc<P>, config: &ProbeConfig) -> Self {
        Self {
            registry,
            probe,
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }

    /// Probe every online device once
    ///
    /// Sends one `StatusChanged` afterwards if anything was probed and
    /// returns the number of devices probed.
    pub async fn probe_pass(&self) -> usize {
        let targets = self.registry.online_devices();
        if targets.is_empty() {
            return 0;
        }

        let mut probes = JoinSet::new();
        for key in targets.iter().cloned() {
            let probe = self.probe.clone();
            let timeout = self.timeout;
            probes.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, probe.probe(key.address, timeout)).await {
                    Ok(result) => {
                        if let Err(e) = &result {
                            debug!("Probe {} failed: {}", key, e);
                        }
                        ProbeOutcome::from(result)
                    }
                    Err(_) => {
                        debug!("Probe {} timed out after {:?}", key, timeout);
                        ProbeOutcome::TimedOut
                    }
                };
                (key, outcome)
            });
        }

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((key, outcome)) => self.record(&key, outcome),
                Err(e) => warn!("Probe task failed: {}", e),
            }
        }

        self.registry.notify_status_changed();
        targets.len()
    }

    fn record(&self, key: &DeviceKey, outcome: ProbeOutcome) {
        let latency_ms = outcome.latency_ms();
        if !self.registry.update_latency(&key.name, key.address, latency_ms) {
            debug!("Device {} vanished before its probe result arrived", key);
        }
    }

    /// Probe until `shutdown` flips to true
    ///
    /// A pass in flight is abandoned on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        probed = self.probe_pass() => {
                            debug!("Latency pass probed {} device(s)", probed);
                        }
                    }
                }
            }
        }

        debug!("Latency prober stopped");
    }
}
