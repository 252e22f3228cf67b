//! Heartbeat listener
//!
//! Binds the heartbeat UDP port and feeds every valid announcement into
//! the registry. Anything else on the port is dropped: the devices share
//! the network with other UDP traffic (touch sensor data, OSC), so
//! non-heartbeat datagrams are expected and not errors.

use crate::config::ListenerConfig;
use crate::constants::{
    MAX_SOCKET_RETRY_ATTEMPTS, RECV_ERROR_BACKOFF_MS, RETRY_BASE_DELAY_MS, UDP_BUFFER_SIZE,
};
use crate::device::DeviceRecord;
use crate::error::{HeartbeatError, Result};
use crate::protocol::{decode_datagram, Rejection};
use crate::registry::FleetRegistry;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Bound heartbeat socket, ready to run
pub struct HeartbeatListener {
    socket: UdpSocket,
    registry: Arc<FleetRegistry>,
}

impl HeartbeatListener {
    /// Bind the configured address
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: &ListenerConfig, registry: Arc<FleetRegistry>) -> Result<Self> {
        let addr = config.socket_addr()?;
        let socket = create_reusable_udp_socket(addr)?;
        Ok(Self { socket, registry })
    }

    /// Actual bound address (useful when port 0 was requested)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive loop; returns once `shutdown` flips to true
    ///
    /// The socket is closed when this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = [0u8; UDP_BUFFER_SIZE];

        if let Ok(addr) = self.socket.local_addr() {
            info!("Listening for heartbeats on {}", addr);
        }

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Owner gone
                        break;
                    }
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, source)) => {
                            self.handle_datagram(&buf[..len], source);
                        }
                        Err(e) => {
                            // ICMP port-unreachable and friends surface here; keep going
                            if !*shutdown.borrow() {
                                debug!("Heartbeat receive error: {}", e);
                            }
                            pause_after_receive_error().await;
                        }
                    }
                }
            }
        }

        debug!("Heartbeat listener stopped");
    }

    /// Decode one datagram and upsert the device it announces
    ///
    /// Returns the updated record, or `None` if the datagram was dropped.
    pub fn handle_datagram(&self, data: &[u8], source: SocketAddr) -> Option<DeviceRecord> {
        match decode_datagram(data, source.ip()) {
            Ok(heartbeat) => Some(self.registry.upsert(&heartbeat.name, heartbeat.address)),
            Err(Rejection::NotHeartbeat) => None,
            Err(Rejection::NotUtf8) => {
                debug!("Dropping non-UTF-8 datagram ({} bytes) from {}", data.len(), source);
                None
            }
            Err(Rejection::MissingName) => {
                debug!("Dropping heartbeat without device name from {}", source);
                None
            }
        }
    }
}

/// Keeps a socket stuck in an error state from spinning the receive loop
async fn pause_after_receive_error() {
    tokio::time::sleep(Duration::from_millis(RECV_ERROR_BACKOFF_MS)).await;
}

/// Create a UDP socket with SO_REUSEADDR for quick rebind after restart
///
/// Retries a few times if the port is still held (e.g., by a previous run).
fn create_reusable_udp_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let map_err = |e| HeartbeatError::UdpBind { addr, source: e };
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    // Try up to MAX_SOCKET_RETRY_ATTEMPTS times with increasing delay
    for attempt in 0..MAX_SOCKET_RETRY_ATTEMPTS {
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(map_err)?;
        socket.set_reuse_address(true).map_err(map_err)?;
        socket.set_nonblocking(true).map_err(map_err)?;

        match socket.bind(&addr.into()) {
            Ok(_) => {
                let std_socket: std::net::UdpSocket = socket.into();
                return UdpSocket::from_std(std_socket).map_err(map_err);
            }
            Err(e) if attempt < MAX_SOCKET_RETRY_ATTEMPTS - 1 => {
                warn!("Bind {} failed ({}), retrying", addr, e);
                // Exponential backoff: 200ms, 400ms
                std::thread::sleep(Duration::from_millis(RETRY_BASE_DELAY_MS * (1 << attempt)));
            }
            Err(e) => return Err(map_err(e)),
        }
    }

    Err(HeartbeatError::UdpBind {
        addr,
        source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "failed after retries"),
    })
}
