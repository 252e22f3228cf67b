//! Application-wide constants
//!
//! Centralized constants to avoid duplication and ensure consistency.

// =============================================================================
// Network
// =============================================================================

/// Default UDP port devices send heartbeats to
pub const DEFAULT_HEARTBEAT_PORT: u16 = 1509;

/// Default bind address (all IPv4 interfaces)
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Literal prefix of every heartbeat datagram (case-sensitive)
pub const HEARTBEAT_PREFIX: &str = "HEARTBEAT:";

/// Prefix of the self-reported address field
pub const ADDRESS_FIELD_PREFIX: &str = "IP:";

// =============================================================================
// Timing - Liveness
// =============================================================================

/// Silence after which a device is marked offline (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 3_000;

/// Interval between liveness sweeps (milliseconds)
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1_000;

/// Minimum interval between refresh-only status notifications (milliseconds)
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5_000;

// =============================================================================
// Timing - Latency probe
// =============================================================================

/// Interval between latency probe passes (milliseconds)
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 10_000;

/// Upper bound for a single probe (milliseconds)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Latency recorded when a probe times out or the device is unreachable
pub const LATENCY_TIMEOUT_SENTINEL: f64 = -1.0;

/// Upper bound (inclusive) of the "Good" latency class (milliseconds)
pub const LATENCY_GOOD_MAX_MS: f64 = 50.0;

/// Upper bound (inclusive) of the "Fair" latency class (milliseconds)
pub const LATENCY_FAIR_MAX_MS: f64 = 150.0;

// =============================================================================
// Timing - Lifecycle
// =============================================================================

/// Grace period granted to each worker when stopping (milliseconds)
pub const WORKER_JOIN_TIMEOUT_MS: u64 = 1_000;

// =============================================================================
// Retry
// =============================================================================

/// Maximum socket bind retry attempts
pub const MAX_SOCKET_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (milliseconds)
pub const RETRY_BASE_DELAY_MS: u64 = 200;

/// Pause after a failed receive before reading again (milliseconds)
pub const RECV_ERROR_BACKOFF_MS: u64 = 50;

// =============================================================================
// Buffers
// =============================================================================

/// UDP receive buffer size
pub const UDP_BUFFER_SIZE: usize = 4096;

/// Capacity of the fleet event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
