//! Latency probes
//!
//! A probe measures one network round trip to a device. The prober worker
//! only sees the `LatencyProbe` trait, so tests can script arbitrary
//! timings and failures without touching the network.
//!
//! # Adding a new probe
//!
//! 1. Implement `LatencyProbe` for your type
//! 2. Pass it to `HeartbeatMonitor::with_probe`

use crate::constants::LATENCY_TIMEOUT_SENTINEL;
use crate::error::{HeartbeatError, Result};
use std::future::Future;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Round-trip probe to a single address
///
/// Implementations should honour `timeout` themselves; the prober also
/// enforces it from the outside and treats an overrun as a timeout.
///
/// Implementations must not panic: report failures as errors. Release
/// builds abort on panic.
pub trait LatencyProbe: Send + Sync + 'static {
    /// Measure the round-trip time to `address`
    ///
    /// Any error (unreachable, timeout, tool failure) is recorded as a
    /// timeout for this device only.
    fn probe(
        &self,
        address: IpAddr,
        timeout: Duration,
    ) -> impl Future<Output = Result<Duration>> + Send;
}

/// Result of one probe as stored in the registry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeOutcome {
    Reply(Duration),
    TimedOut,
}

impl ProbeOutcome {
    /// Latency in milliseconds, or the negative timeout sentinel
    pub fn latency_ms(&self) -> f64 {
        match self {
            Self::Reply(rtt) => rtt.as_secs_f64() * 1000.0,
            Self::TimedOut => LATENCY_TIMEOUT_SENTINEL,
        }
    }
}

impl From<Result<Duration>> for ProbeOutcome {
    fn from(result: Result<Duration>) -> Self {
        match result {
            Ok(rtt) => Self::Reply(rtt),
            Err(_) => Self::TimedOut,
        }
    }
}

// =============================================================================
// System ping
// =============================================================================

/// Probe using the operating system's `ping` tool (one echo request)
///
/// ICMP sockets need elevated privileges on most platforms; the system tool
/// is already set up to send them.
#[derive(Debug, Clone, Default)]
pub struct PingProbe;

impl PingProbe {
    pub fn new() -> Self {
        Self
    }

    fn command(address: IpAddr, timeout: Duration) -> Command {
        let mut cmd = Command::new("ping");

        #[cfg(windows)]
        {
            let wait_ms = timeout.as_millis().max(1).to_string();
            cmd.args(["-n", "1", "-w", &wait_ms]);
        }

        // Unix tools take whole seconds; round up so short timeouts still wait
        #[cfg(target_os = "macos")]
        {
            let wait_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
            cmd.args(["-c", "1", "-t", &wait_secs.max(1).to_string()]);
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            let wait_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
            cmd.args(["-c", "1", "-W", &wait_secs.max(1).to_string()]);
        }

        cmd.arg(address.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

impl LatencyProbe for PingProbe {
    fn probe(
        &self,
        address: IpAddr,
        timeout: Duration,
    ) -> impl Future<Output = Result<Duration>> + Send {
        async move {
            let started = Instant::now();
            let mut cmd = Self::command(address, timeout);
            let output = cmd
                .output()
                .await
                .map_err(|e| HeartbeatError::OsCommand {
                    program: "ping",
                    source: e,
                })?;
            let elapsed = started.elapsed();

            if !output.status.success() {
                return Err(HeartbeatError::Probe {
                    address,
                    reason: format!("ping exited with {}", output.status),
                });
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(parse_ping_time(&stdout)
                .map(|ms| Duration::from_secs_f64(ms / 1000.0))
                .unwrap_or(elapsed))
        }
    }
}

/// Extract the reported round-trip time (ms) from `ping` output
///
/// Understands `time=12.3 ms` (Linux/macOS), `time=12ms` and `time<1ms`
/// (Windows). `time<1ms` is reported as 0.5 ms.
pub fn parse_ping_time(output: &str) -> Option<f64> {
    let idx = output.find("time")?;
    let rest = &output[idx + "time".len()..];

    if let Some(value) = rest.strip_prefix('<') {
        return leading_number(value).map(|v| v / 2.0);
    }

    leading_number(rest.strip_prefix('=')?)
}

fn leading_number(s: &str) -> Option<f64> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len());
    s[..end].parse().ok()
}
