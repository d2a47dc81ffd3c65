//! Typed configuration snapshot consumed by the pipeline at startup.
//!
//! The persistent store and its schema live outside this crate; the daemon
//! loads whatever it keeps on disk and hands the pipeline these plain values
//! once. Nothing here is re-read at runtime.

use crate::{PipelineError, Result};

use std::net::SocketAddr;
use std::panic::Location;
use std::time::Duration;

use error_location::ErrorLocation;

/// Wire sample width. The capture peripheral always delivers 32-bit slots;
/// this selects how they are packed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitWidth {
    /// One byte per sample.
    B8,
    /// Two bytes per sample, little-endian.
    B16,
    /// Three bytes per sample, low byte of the 32-bit slot dropped.
    B24,
    /// Four bytes per sample, little-endian.
    B32,
}

impl BitWidth {
    /// Bytes per packed sample.
    pub fn bytes(self) -> usize {
        match self {
            Self::B8 => 1,
            Self::B16 => 2,
            Self::B24 => 3,
            Self::B32 => 4,
        }
    }

    /// Bits per packed sample.
    pub fn bits(self) -> u8 {
        (self.bytes() * 8) as u8
    }
}

/// GPIO assignment of the wired microphone: bit clock, word select, data-in.
/// No master clock. Logged at driver init so field units can be identified
/// from the stream logs.
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    /// Bit clock GPIO.
    pub bclk: u8,
    /// Word select (LR clock) GPIO.
    pub ws: u8,
    /// Data-in GPIO.
    pub din: u8,
}

/// Capture driver settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Wire sample width.
    pub bit_width: BitWidth,
    /// Channel count; the pipeline captures the left slot only.
    pub channels: u16,
    /// Samples per capture block.
    pub block_samples: usize,
    /// Descriptors in the driver's internal frame ring.
    pub ring_descriptors: usize,
    /// Deadline for one block read.
    pub read_timeout: Duration,
    /// Wired peripheral pins.
    pub pins: PinMap,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            bit_width: BitWidth::B16,
            channels: 1,
            block_samples: 512,
            ring_descriptors: 8,
            read_timeout: Duration::from_millis(50),
            pins: PinMap { bclk: 2, ws: 3, din: 1 },
        }
    }
}

/// Streaming protocol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// Connection-oriented, in-order byte stream.
    Reliable,
    /// Sequenced, lossy datagrams.
    Datagram,
}

/// Transport settings.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Which protocol to stream over.
    pub protocol: ProtocolKind,
    /// Remote collector endpoint.
    pub endpoint: SocketAddr,
    /// Samples per transmit batch.
    pub batch_samples: usize,
    /// Immediate connect attempts before `init` gives up.
    pub connect_attempts: u32,
    /// First retry delay inside `init`/`reconnect`; doubles per attempt.
    pub connect_backoff: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::Reliable,
            endpoint: SocketAddr::from(([192, 168, 1, 50], 9000)),
            batch_samples: 4096,
            connect_attempts: 5,
            connect_backoff: Duration::from_secs(2),
        }
    }
}

/// Network link monitor and wall-clock settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Interval between route probes.
    pub probe_interval: Duration,
    /// Failed probes after a loss before the monitor escalates to FATAL.
    pub max_link_losses: u32,
    /// SNTP server, `host:port`.
    pub ntp_server: String,
    /// Interval between wall-clock resyncs.
    pub ntp_resync_interval: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(2),
            max_link_losses: 20,
            ntp_server: "pool.ntp.org:123".to_string(),
            ntp_resync_interval: Duration::from_secs(3600),
        }
    }
}

/// Failure thresholds, recovery knobs and scheduling hints.
#[derive(Debug, Clone)]
pub struct SupervisionConfig {
    /// A task not feeding for this long is declared dead.
    pub watchdog_timeout: Duration,
    /// Interval between statistics roll-ups.
    pub stats_interval: Duration,
    /// Consecutive capture read failures before the driver is reinitialized.
    pub max_capture_failures: u32,
    /// Counted ring overflows before the emergency drain.
    pub max_ring_overflows: u32,
    /// Quiet period after which the overflow counter resets.
    pub overflow_cooldown: Duration,
    /// First transmit retry delay after a send failure.
    pub reconnect_backoff: Duration,
    /// Ceiling for the doubled retry delay.
    pub max_reconnect_backoff: Duration,
    /// Failed reconnects before the pipeline escalates to FATAL.
    pub max_reconnect_attempts: u32,
    /// Whether FATAL conditions restart the process.
    pub auto_reboot: bool,
    /// Warn when available memory falls below this many KiB.
    pub min_free_memory_kib: u64,
    /// Transmit task startup delay, letting the ring fill.
    pub startup_delay: Duration,
    /// CPU to pin the capture task to, if any.
    pub capture_core: Option<usize>,
    /// CPU to pin the transmit and supervisor tasks to, if any.
    pub transmit_core: Option<usize>,
    /// Realtime priority for the capture task (1-99), best effort.
    pub capture_priority: Option<u8>,
    /// Realtime priority for the transmit task (1-99), best effort.
    pub transmit_priority: Option<u8>,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout: Duration::from_secs(60),
            stats_interval: Duration::from_secs(10),
            max_capture_failures: 100,
            max_ring_overflows: 20,
            overflow_cooldown: Duration::from_millis(5000),
            reconnect_backoff: Duration::from_millis(1000),
            max_reconnect_backoff: Duration::from_millis(30_000),
            max_reconnect_attempts: 10,
            auto_reboot: true,
            min_free_memory_kib: 20_480,
            startup_delay: Duration::from_secs(5),
            capture_core: None,
            transmit_core: None,
            capture_priority: Some(10),
            transmit_priority: Some(8),
        }
    }
}

/// The complete snapshot handed to [`crate::Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Capture driver settings.
    pub capture: CaptureConfig,
    /// Ring buffer capacity in bytes.
    pub ring_bytes: usize,
    /// Transport settings.
    pub transport: TransportConfig,
    /// Link monitor settings.
    pub link: LinkConfig,
    /// Thresholds and recovery knobs.
    pub supervision: SupervisionConfig,
}

impl PipelineConfig {
    /// Checks every value against its admissible range.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` naming the first offending value.
    #[track_caller]
    pub fn validate(&self) -> Result<()> {
        let reject = |reason: String| {
            Err(PipelineError::InvalidConfig {
                reason,
                location: ErrorLocation::from(Location::caller()),
            })
        };

        let rate = self.capture.sample_rate;
        if !(8_000..=96_000).contains(&rate) {
            return reject(format!("sample rate {} outside 8000..=96000", rate));
        }
        if !(1..=2).contains(&self.capture.channels) {
            return reject(format!("channel count {} outside 1..=2", self.capture.channels));
        }
        if self.capture.block_samples == 0 {
            return reject("capture block of zero samples".to_string());
        }
        if self.capture.ring_descriptors == 0 {
            return reject("capture frame ring of zero descriptors".to_string());
        }
        if self.ring_bytes < self.capture.block_samples * size_of::<i32>() {
            return reject(format!(
                "ring of {} bytes holds less than one {}-sample block",
                self.ring_bytes, self.capture.block_samples
            ));
        }
        if self.transport.batch_samples == 0 {
            return reject("transmit batch of zero samples".to_string());
        }
        if self.transport.connect_attempts == 0 {
            return reject("zero transport connect attempts".to_string());
        }
        if self.supervision.max_reconnect_attempts == 0 {
            return reject("zero reconnect attempts before escalation".to_string());
        }
        if self.supervision.reconnect_backoff > self.supervision.max_reconnect_backoff {
            return reject(format!(
                "reconnect backoff {:?} above its ceiling {:?}",
                self.supervision.reconnect_backoff, self.supervision.max_reconnect_backoff
            ));
        }
        if self.supervision.watchdog_timeout.is_zero() {
            return reject("zero watchdog timeout".to_string());
        }

        Ok(())
    }

    /// Default ring size: 48 KiB, the footprint that fits the target's
    /// fragmented memory after the network stack comes up.
    pub const DEFAULT_RING_BYTES: usize = 48 * 1024;
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            ring_bytes: Self::DEFAULT_RING_BYTES,
            transport: TransportConfig::default(),
            link: LinkConfig::default(),
            supervision: SupervisionConfig::default(),
        }
    }
}
