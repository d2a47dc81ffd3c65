//! Stream transports: the reliable byte-stream sender and the sequenced
//! datagram sender, behind one interface.
//!
//! The transmit task owns the active transport exclusively; everyone else
//! (supervisor, tests) observes it through the shared [`TransportCounters`].

mod packing;
mod tcp;
mod udp;

pub use packing::{pack_append, packed_len};
pub use tcp::TcpTransport;
pub use udp::{DATAGRAM_HEADER_LEN, MAX_DATAGRAM_LEN, UdpTransport};

use crate::Result;
use crate::config::{BitWidth, TransportConfig};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// One streaming sender to the remote collector.
pub trait Transport: Send {
    /// Whether a usable socket is currently held.
    fn is_connected(&self) -> bool;

    /// Packs and ships `samples`. Sending zero samples succeeds without
    /// touching the socket. On `Err` the caller backs off and calls
    /// [`Transport::reconnect`].
    fn send(&mut self, samples: &[i32]) -> Result<()>;

    /// Drops the current socket and re-establishes, with the same retry
    /// discipline as the initial connect.
    fn reconnect(&mut self) -> Result<()>;

    /// Drops the socket without reconnecting.
    fn close(&mut self);

    /// Snapshot of the session counters.
    fn stats(&self) -> TransportStats;
}

/// Live counters for one transport session, shared with the supervisor.
#[derive(Debug, Default)]
pub struct TransportCounters {
    bytes_sent: AtomicU64,
    packets_sent: AtomicU64,
    lost_packets: AtomicU64,
    reconnects: AtomicU32,
}

impl TransportCounters {
    /// Fresh zeroed counters.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            lost_packets: self.lost_packets.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }

    fn add_bytes(&self, n: u64) {
        self.bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    fn add_packet(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn add_lost(&self) {
        self.lost_packets.fetch_add(1, Ordering::Relaxed);
    }

    fn add_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time transport statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    /// Payload bytes shipped since startup.
    pub bytes_sent: u64,
    /// Datagrams shipped; zero for the reliable transport.
    pub packets_sent: u64,
    /// Datagrams dropped on send; zero for the reliable transport.
    pub lost_packets: u64,
    /// Completed reconnects.
    pub reconnects: u32,
}

impl TransportStats {
    /// Fraction of packets lost, `lost / sent`.
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.lost_packets as f64 / self.packets_sent as f64
        }
    }
}

/// The configured transport, one variant per protocol.
pub enum AnyTransport {
    /// Connection-oriented in-order sender.
    Reliable(TcpTransport),
    /// Sequenced lossy sender.
    Datagram(UdpTransport),
}

impl AnyTransport {
    /// Builds the transport the configuration selects and performs the
    /// initial connect.
    ///
    /// # Errors
    ///
    /// `InitFailed` when the reliable transport exhausts its connect
    /// attempts or the datagram socket cannot be created.
    #[track_caller]
    pub fn open(
        config: &TransportConfig,
        width: BitWidth,
        counters: Arc<TransportCounters>,
    ) -> Result<Self> {
        match config.protocol {
            crate::config::ProtocolKind::Reliable => {
                Ok(Self::Reliable(TcpTransport::open(config, width, counters)?))
            }
            crate::config::ProtocolKind::Datagram => {
                Ok(Self::Datagram(UdpTransport::open(config, width, counters)?))
            }
        }
    }
}

impl Transport for AnyTransport {
    fn is_connected(&self) -> bool {
        match self {
            Self::Reliable(t) => t.is_connected(),
            Self::Datagram(t) => t.is_connected(),
        }
    }

    fn send(&mut self, samples: &[i32]) -> Result<()> {
        match self {
            Self::Reliable(t) => t.send(samples),
            Self::Datagram(t) => t.send(samples),
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        match self {
            Self::Reliable(t) => t.reconnect(),
            Self::Datagram(t) => t.reconnect(),
        }
    }

    fn close(&mut self) {
        match self {
            Self::Reliable(t) => t.close(),
            Self::Datagram(t) => t.close(),
        }
    }

    fn stats(&self) -> TransportStats {
        match self {
            Self::Reliable(t) => t.stats(),
            Self::Datagram(t) => t.stats(),
        }
    }
}
