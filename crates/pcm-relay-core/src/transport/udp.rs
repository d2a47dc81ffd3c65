//! Datagram transport: sequenced, lossy, one packet per datagram.
//!
//! Each datagram is a 12-byte little-endian header followed by packed
//! samples:
//!
//! ```text
//! seq: u32 | timestamp_ms: u32 | sample_count: u16 | flags: u16
//! ```
//!
//! `seq` increases by one per packet; receivers detect loss from gaps.
//! `timestamp_ms` is this sender's monotonic tick at packet construction.
//! There is no handshake: "reconnect" recreates the socket and restarts the
//! sequence at zero.

use crate::config::{BitWidth, TransportConfig};
use crate::transport::{Transport, TransportCounters, TransportStats, packing};
use crate::{PipelineError, Result};

use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::panic::Location;
use std::sync::Arc;
use std::time::{Duration, Instant};

use error_location::ErrorLocation;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, instrument, warn};

/// Largest datagram that stays under the Ethernet MTU with IP+UDP headers.
pub const MAX_DATAGRAM_LEN: usize = 1472;

/// Fixed header length ahead of the packed samples.
pub const DATAGRAM_HEADER_LEN: usize = 12;

const SEND_TIMEOUT: Duration = Duration::from_millis(100);
const SOCKET_BUFFER_BYTES: usize = 64 * 1024;

/// Datagram sender. Owned by the transmit task.
pub struct UdpTransport {
    endpoint: SocketAddr,
    width: BitWidth,
    socket: Option<UdpSocket>,
    seq: u32,
    epoch: Instant,
    scratch: Vec<u8>,
    counters: Arc<TransportCounters>,
}

impl UdpTransport {
    /// Creates the unconnected socket. No handshake happens; failure here
    /// means the local socket could not be created or tuned.
    ///
    /// # Errors
    ///
    /// `InitFailed` when socket creation fails.
    #[track_caller]
    #[instrument(skip(config, counters), fields(endpoint = %config.endpoint))]
    pub fn open(
        config: &TransportConfig,
        width: BitWidth,
        counters: Arc<TransportCounters>,
    ) -> Result<Self> {
        let socket = create_socket(config.endpoint).map_err(|e| PipelineError::InitFailed {
            what: format!("datagram transport to {}: {}", config.endpoint, e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(endpoint = %config.endpoint, session = %uuid::Uuid::new_v4(), "Datagram socket ready");

        Ok(Self {
            endpoint: config.endpoint,
            width,
            socket: Some(socket),
            seq: 0,
            epoch: Instant::now(),
            scratch: Vec::with_capacity(MAX_DATAGRAM_LEN),
            counters,
        })
    }

    /// Most samples one datagram can carry at `width`.
    pub fn max_samples_per_packet(width: BitWidth) -> usize {
        (MAX_DATAGRAM_LEN - DATAGRAM_HEADER_LEN) / width.bytes()
    }

    /// Sequence number the next packet will carry.
    pub fn next_seq(&self) -> u32 {
        self.seq
    }

    #[track_caller]
    fn send_packet(&mut self, samples: &[i32]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or_else(|| PipelineError::TransportFailure {
            reason: "send without a socket".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let payload_len = packing::packed_len(samples.len(), self.width);
        let packet_len = DATAGRAM_HEADER_LEN + payload_len;
        if packet_len > MAX_DATAGRAM_LEN {
            return Err(PipelineError::TransportFailure {
                reason: format!("packet of {} bytes exceeds {}", packet_len, MAX_DATAGRAM_LEN),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        let timestamp_ms = self.epoch.elapsed().as_millis() as u32;

        self.scratch.clear();
        self.scratch.extend_from_slice(&seq.to_le_bytes());
        self.scratch.extend_from_slice(&timestamp_ms.to_le_bytes());
        self.scratch.extend_from_slice(&(samples.len() as u16).to_le_bytes());
        self.scratch.extend_from_slice(&0u16.to_le_bytes());
        packing::pack_append(samples, self.width, &mut self.scratch);

        match socket.send_to(&self.scratch, self.endpoint) {
            Ok(sent) if sent == packet_len => {
                self.counters.add_bytes(payload_len as u64);
                self.counters.add_packet();
                Ok(())
            }
            Ok(sent) => {
                self.counters.add_lost();
                Err(PipelineError::TransportFailure {
                    reason: format!("partial datagram: {}/{} bytes", sent, packet_len),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                self.counters.add_lost();
                warn!(seq, "Datagram send timed out, packet lost");
                Err(PipelineError::TransportFailure {
                    reason: format!("datagram {} timed out", seq),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
            Err(e) => {
                self.counters.add_lost();
                Err(PipelineError::TransportFailure {
                    reason: format!("datagram {}: {}", seq, e),
                    location: ErrorLocation::from(Location::caller()),
                })
            }
        }
    }
}

impl Transport for UdpTransport {
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    #[track_caller]
    fn send(&mut self, samples: &[i32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        for chunk in samples.chunks(Self::max_samples_per_packet(self.width)) {
            self.send_packet(chunk)?;
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.counters.add_reconnect();
        let socket =
            create_socket(self.endpoint).map_err(|e| PipelineError::TransportFailure {
                reason: format!("datagram socket recreation: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        self.socket = Some(socket);
        // No peer handshake exists, so the stream restarts from zero.
        self.seq = 0;
        info!(endpoint = %self.endpoint, "Datagram socket recreated");
        Ok(())
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!(endpoint = %self.endpoint, "Datagram socket closed");
        }
    }

    fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }
}

/// Unconnected socket with 64 KiB buffers and a 100 ms send timeout.
fn create_socket(endpoint: SocketAddr) -> std::result::Result<UdpSocket, String> {
    let socket = Socket::new(Domain::for_address(endpoint), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| format!("socket: {}", e))?;
    socket
        .set_send_buffer_size(SOCKET_BUFFER_BYTES)
        .map_err(|e| format!("send buffer: {}", e))?;
    socket
        .set_recv_buffer_size(SOCKET_BUFFER_BYTES)
        .map_err(|e| format!("recv buffer: {}", e))?;
    socket
        .set_write_timeout(Some(SEND_TIMEOUT))
        .map_err(|e| format!("send timeout: {}", e))?;

    let local: SocketAddr = match endpoint {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    socket.bind(&local.into()).map_err(|e| format!("bind: {}", e))?;

    Ok(socket.into())
}
