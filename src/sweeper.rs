//! Liveness sweeper
//!
//! Re-evaluates every device on a fixed interval. A transition is pushed
//! to subscribers immediately; otherwise a refresh-only notification goes
//! out at most once per refresh interval so displayed elapsed times keep
//! moving without redrawing on every sweep.

use crate::config::LivenessConfig;
use crate::registry::FleetRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Rate limiter for refresh-only notifications
///
/// The first check only arms the timer; later checks fire once at least
/// `interval` has passed since the last refresh.
#[derive(Debug)]
pub struct RefreshThrottle {
    interval: Option<Duration>,
    last_refresh: Option<Instant>,
}

impl RefreshThrottle {
    /// `None` disables refresh-only notifications
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            interval,
            last_refresh: None,
        }
    }

    /// Whether a refresh is due at `now` (consumes it if so)
    pub fn should_refresh(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };

        match self.last_refresh {
            None => {
                self.last_refresh = Some(now);
                false
            }
            Some(last) if now.saturating_duration_since(last) >= interval => {
                self.last_refresh = Some(now);
                true
            }
            Some(_) => false,
        }
    }
}

/// Periodic timeout evaluation against the shared registry
pub struct LivenessSweeper {
    registry: Arc<FleetRegistry>,
    timeout: Duration,
    interval: Duration,
    throttle: RefreshThrottle,
}

impl LivenessSweeper {
    pub fn new(registry: Arc<FleetRegistry>, config: &LivenessConfig) -> Self {
        Self {
            registry,
            timeout: config.timeout(),
            interval: config.sweep_interval(),
            throttle: RefreshThrottle::new(config.refresh_interval()),
        }
    }

    /// One sweep; returns whether a status notification was sent
    pub fn sweep_once(&mut self, now: Instant) -> bool {
        if self.registry.sweep_timeouts(self.timeout) {
            self.registry.notify_status_changed();
            true
        } else if self.throttle.should_refresh(now) {
            self.registry.notify_status_changed();
            true
        } else {
            false
        }
    }

    /// Sweep until `shutdown` flips to true
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        // First sweep one interval after start, like every later one
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                now = ticker.tick() => {
                    self.sweep_once(now);
                }
            }
        }

        debug!("Liveness sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FleetEvent;
    use chrono::{Local, TimeDelta};
    use tokio::sync::broadcast::error::TryRecvError;

    fn config(refresh_interval_ms: u64) -> LivenessConfig {
        LivenessConfig {
            timeout_ms: 3000,
            sweep_interval_ms: 1000,
            refresh_interval_ms,
        }
    }

    fn count_status_changes(rx: &mut tokio::sync::broadcast::Receiver<FleetEvent>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(FleetEvent::StatusChanged(_)) => count += 1,
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => {}
                Err(_) => break,
            }
        }
        count
    }

    #[test]
    fn test_throttle_first_check_only_arms() {
        let mut throttle = RefreshThrottle::new(Some(Duration::from_secs(5)));
        let t0 = Instant::now();

        assert!(!throttle.should_refresh(t0));
        assert!(!throttle.should_refresh(t0 + Duration::from_secs(4)));
        assert!(throttle.should_refresh(t0 + Duration::from_secs(5)));
        assert!(!throttle.should_refresh(t0 + Duration::from_secs(6)));
        assert!(throttle.should_refresh(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_throttle_disabled() {
        let mut throttle = RefreshThrottle::new(None);
        let t0 = Instant::now();

        for i in 0..20 {
            assert!(!throttle.should_refresh(t0 + Duration::from_secs(i)));
        }
    }

    #[test]
    fn test_sweep_once_transition_notifies_immediately() {
        let registry = Arc::new(FleetRegistry::new());
        registry.upsert_at(
            "Cube43",
            "192.168.0.43".parse().unwrap(),
            Local::now() - TimeDelta::seconds(10),
        );
        let mut rx = registry.subscribe();
        let mut sweeper = LivenessSweeper::new(registry.clone(), &config(0));

        assert!(sweeper.sweep_once(Instant::now()));
        assert_eq!(count_status_changes(&mut rx), 1);
        assert_eq!(registry.statistics().offline, 1);

        // Nothing changes and refresh is disabled
        assert!(!sweeper.sweep_once(Instant::now()));
        assert_eq!(count_status_changes(&mut rx), 0);
    }

    #[test]
    fn test_sweep_once_refresh_throttled() {
        let registry = Arc::new(FleetRegistry::new());
        registry.upsert("Cube43", "192.168.0.43".parse().unwrap());
        let mut rx = registry.subscribe();
        let mut sweeper = LivenessSweeper::new(registry, &config(5000));
        let t0 = Instant::now();

        // One sweep per second for 11 seconds: refreshes at t=5 and t=10
        let sent = (0..=10)
            .filter(|i| sweeper.sweep_once(t0 + Duration::from_secs(*i)))
            .count();

        assert_eq!(sent, 2);
        assert_eq!(count_status_changes(&mut rx), 2);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let registry = Arc::new(FleetRegistry::new());
        let sweeper = LivenessSweeper::new(registry, &config(5000));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(sweeper.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
