//! Best-effort wall clock.
//!
//! The pipeline never steps the host clock; it keeps a signed offset from a
//! periodic SNTP query and floors the result at a known-safe epoch so log
//! and file timestamps stay monotonic across reboots even when sync never
//! succeeds.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

/// 2025-01-01T00:00:00Z. Earlier readings are clamped up to this.
const SAFE_EPOCH_SECS: u64 = 1_735_689_600;

/// Seconds between the NTP era (1900) and the Unix epoch (1970).
const NTP_UNIX_DELTA: i64 = 2_208_988_800;

const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Offset-corrected, floored view of the system clock.
#[derive(Debug, Default)]
pub struct WallClock {
    offset_ms: AtomicI64,
    synced: AtomicBool,
}

impl WallClock {
    /// A clock with no correction applied yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one sync has succeeded since startup.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Current wall-clock time, never before the safe epoch.
    pub fn now(&self) -> SystemTime {
        let offset = self.offset_ms.load(Ordering::Acquire);
        let raw = if offset >= 0 {
            SystemTime::now() + Duration::from_millis(offset as u64)
        } else {
            SystemTime::now() - Duration::from_millis(offset.unsigned_abs())
        };
        let floor = UNIX_EPOCH + Duration::from_secs(SAFE_EPOCH_SECS);
        raw.max(floor)
    }

    /// Queries `server` (`host:port`) once and stores the measured offset.
    /// Failure leaves the previous offset in place.
    pub fn sync(&self, server: &str) {
        match query(server) {
            Ok(remote) => {
                let offset_ms = match remote.duration_since(SystemTime::now()) {
                    Ok(ahead) => ahead.as_millis() as i64,
                    Err(behind) => -(behind.duration().as_millis() as i64),
                };
                self.offset_ms.store(offset_ms, Ordering::Release);
                self.synced.store(true, Ordering::Release);
                info!(offset_ms, server, "Wall clock synced");
            }
            Err(e) => {
                warn!(server, error = %e, "Wall clock sync failed");
            }
        }
    }
}

/// One SNTP round trip: 48-byte mode-3 request, transmit timestamp out of
/// the reply.
fn query(server: &str) -> std::result::Result<SystemTime, String> {
    let addr = server
        .to_socket_addrs()
        .map_err(|e| format!("resolve: {}", e))?
        .next()
        .ok_or_else(|| "no address".to_string())?;

    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| format!("bind: {}", e))?;
    socket
        .set_read_timeout(Some(QUERY_TIMEOUT))
        .map_err(|e| format!("read timeout: {}", e))?;
    socket
        .set_write_timeout(Some(QUERY_TIMEOUT))
        .map_err(|e| format!("write timeout: {}", e))?;

    let mut request = [0u8; 48];
    request[0] = 0b0010_0011; // LI 0, version 4, mode 3 (client)
    socket
        .send_to(&request, addr)
        .map_err(|e| format!("send: {}", e))?;

    let mut response = [0u8; 48];
    let (len, _) = socket
        .recv_from(&mut response)
        .map_err(|e| format!("recv: {}", e))?;
    if len < 48 {
        return Err(format!("short response: {} bytes", len));
    }
    if response[0] & 0x07 != 4 {
        return Err("not a server reply".to_string());
    }
    if response[1] == 0 {
        return Err("kiss-of-death (stratum 0)".to_string());
    }

    let secs = u32::from_be_bytes([response[40], response[41], response[42], response[43]]);
    let frac = u32::from_be_bytes([response[44], response[45], response[46], response[47]]);
    let unix_secs = secs as i64 - NTP_UNIX_DELTA;
    if unix_secs < 0 {
        return Err("timestamp before the Unix epoch".to_string());
    }
    let millis = (frac as u64 * 1000) >> 32;

    Ok(UNIX_EPOCH + Duration::from_secs(unix_secs as u64) + Duration::from_millis(millis))
}
