//! Centralized error types for the heartbeat monitor
//!
//! All monitor errors are represented by the `HeartbeatError` enum.
//! Use `Result<T>` as shorthand for `std::result::Result<T, HeartbeatError>`.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// All heartbeat monitor errors
#[derive(Debug)]
pub enum HeartbeatError {
    // === Network ===
    /// Failed to bind the heartbeat UDP socket
    UdpBind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    /// Bind address in config is not an IP address
    InvalidBindAddress { value: String },

    // === Probe ===
    /// Latency probe could not reach the device
    Probe { address: IpAddr, reason: String },
    /// Failed to spawn an OS command
    OsCommand {
        program: &'static str,
        source: std::io::Error,
    },

    // === Config ===
    /// Config file could not be read or written
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Config file is not valid TOML for our schema
    ConfigParse { path: PathBuf, reason: String },
    /// Invalid config value
    ConfigValidation { field: &'static str, reason: String },

    // === Runtime ===
    /// Tokio runtime creation failed
    Runtime { source: std::io::Error },
}

impl std::error::Error for HeartbeatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UdpBind { source, .. }
            | Self::OsCommand { source, .. }
            | Self::ConfigRead { source, .. }
            | Self::Runtime { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for HeartbeatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UdpBind { addr, source } => {
                write!(f, "Cannot bind UDP socket {}: {}", addr, source)
            }
            Self::InvalidBindAddress { value } => {
                write!(f, "Invalid bind address: {}", value)
            }
            Self::Probe { address, reason } => {
                write!(f, "Probe to {} failed: {}", address, reason)
            }
            Self::OsCommand { program, source } => {
                write!(f, "Command failed: {}: {}", program, source)
            }
            Self::ConfigRead { path, .. } => write!(f, "Cannot access config: {}", path.display()),
            Self::ConfigParse { path, reason } => {
                write!(f, "Invalid config {}: {}", path.display(), reason)
            }
            Self::ConfigValidation { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
            Self::Runtime { .. } => write!(f, "Failed to create runtime"),
        }
    }
}

/// Alias for Result with HeartbeatError
pub type Result<T> = std::result::Result<T, HeartbeatError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_udp_bind_display_and_source() {
        let err = HeartbeatError::UdpBind {
            addr: "0.0.0.0:1509".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };

        assert!(err.to_string().contains("0.0.0.0:1509"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_validation_has_no_source() {
        let err = HeartbeatError::ConfigValidation {
            field: "liveness.timeout_ms",
            reason: "must be greater than zero".into(),
        };

        assert_eq!(
            err.to_string(),
            "Invalid liveness.timeout_ms: must be greater than zero"
        );
        assert!(err.source().is_none());
    }
}
