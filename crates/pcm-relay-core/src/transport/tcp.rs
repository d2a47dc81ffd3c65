//! Reliable stream transport: one TCP connection shipping packed samples as
//! a raw byte stream. No framing; the receiver demarcates by connection
//! lifetime.

use crate::config::{BitWidth, TransportConfig};
use crate::transport::{Transport, TransportCounters, TransportStats, packing};
use crate::{PipelineError, Result};

use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use error_location::ErrorLocation;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use tracing::{info, instrument, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(5);
const KEEPALIVE_RETRIES: u32 = 3;
const SOCKET_BUFFER_BYTES: usize = 32 * 1024;

/// Reliable sender. Owned by the transmit task.
pub struct TcpTransport {
    endpoint: SocketAddr,
    width: BitWidth,
    connect_attempts: u32,
    connect_backoff: Duration,
    stream: Option<TcpStream>,
    scratch: Vec<u8>,
    counters: Arc<TransportCounters>,
}

impl TcpTransport {
    /// Connects to the configured collector, retrying with doubling delays
    /// up to `connect_attempts` times. A collector that is down at boot is
    /// not fatal: the transport comes back disconnected and the transmit
    /// task's reconnect ladder keeps trying.
    #[track_caller]
    #[instrument(skip(config, counters), fields(endpoint = %config.endpoint))]
    pub fn open(
        config: &TransportConfig,
        width: BitWidth,
        counters: Arc<TransportCounters>,
    ) -> Result<Self> {
        let mut transport = Self {
            endpoint: config.endpoint,
            width,
            connect_attempts: config.connect_attempts,
            connect_backoff: config.connect_backoff,
            stream: None,
            scratch: Vec::with_capacity(packing::packed_len(config.batch_samples, width)),
            counters,
        };
        if let Err(e) = transport.establish() {
            warn!(error = %e, "Initial connection failed, will retry in background");
        }
        Ok(transport)
    }

    fn establish(&mut self) -> Result<()> {
        let mut delay = self.connect_backoff;
        let mut last_error = String::new();

        for attempt in 1..=self.connect_attempts {
            match connect(self.endpoint) {
                Ok(stream) => {
                    let session = uuid::Uuid::new_v4();
                    info!(endpoint = %self.endpoint, session = %session, "Connected");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        attempt,
                        attempts = self.connect_attempts,
                        error = %e,
                        "Connect failed"
                    );
                    last_error = e;
                }
            }
            if attempt < self.connect_attempts {
                std::thread::sleep(delay);
                delay *= 2;
            }
        }

        Err(PipelineError::TransportFailure {
            reason: format!(
                "no connection after {} attempts: {}",
                self.connect_attempts, last_error
            ),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    #[track_caller]
    fn send(&mut self, samples: &[i32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let stream = self.stream.as_mut().ok_or_else(|| PipelineError::TransportFailure {
            reason: "send without a connection".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;

        self.scratch.clear();
        packing::pack_append(samples, self.width, &mut self.scratch);

        // write_all loops over short writes and fails fast on the first
        // system error; the send timeout on the socket bounds each write.
        stream
            .write_all(&self.scratch)
            .map_err(|e| PipelineError::TransportFailure {
                reason: format!("send of {} bytes: {}", self.scratch.len(), e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        self.counters.add_bytes(self.scratch.len() as u64);
        Ok(())
    }

    fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.counters.add_reconnect();
        self.establish()
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            info!(endpoint = %self.endpoint, "Connection closed");
        }
    }

    fn stats(&self) -> TransportStats {
        self.counters.snapshot()
    }
}

/// One connect attempt with the full socket tuning: keepalive on (idle 30 s,
/// interval 5 s, 3 probes), Nagle off, 5 s send timeout, 32 KiB buffers.
fn connect(endpoint: SocketAddr) -> std::result::Result<TcpStream, String> {
    let socket = Socket::new(Domain::for_address(endpoint), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| format!("socket: {}", e))?;

    let keepalive = TcpKeepalive::new()
        .with_time(KEEPALIVE_IDLE)
        .with_interval(KEEPALIVE_INTERVAL)
        .with_retries(KEEPALIVE_RETRIES);
    socket
        .set_tcp_keepalive(&keepalive)
        .map_err(|e| format!("keepalive: {}", e))?;
    socket.set_nodelay(true).map_err(|e| format!("nodelay: {}", e))?;
    socket
        .set_send_buffer_size(SOCKET_BUFFER_BYTES)
        .map_err(|e| format!("send buffer: {}", e))?;
    socket
        .set_recv_buffer_size(SOCKET_BUFFER_BYTES)
        .map_err(|e| format!("recv buffer: {}", e))?;
    socket
        .set_write_timeout(Some(SEND_TIMEOUT))
        .map_err(|e| format!("send timeout: {}", e))?;

    socket
        .connect_timeout(&endpoint.into(), CONNECT_TIMEOUT)
        .map_err(|e| format!("connect: {}", e))?;

    Ok(socket.into())
}
