//! Capture driver: pulls fixed-size blocks of 32-bit sample slots from the
//! microphone peripheral.
//!
//! The pipeline talks to the driver through [`BlockReader`]; the production
//! implementation is [`MicCapture`], and [`SineReader`] generates a
//! deterministic tone for bring-up and tests. Readers are constructed on the
//! capture thread itself (the underlying device stream is not `Send`), so
//! the pipeline takes a reader *factory* rather than a reader.

mod mic;
mod synth;

pub use mic::MicCapture;
pub use synth::SineReader;

use crate::Result;
use crate::config::BitWidth;

use std::sync::atomic::{AtomicU64, Ordering};

/// A source of capture blocks.
pub trait BlockReader {
    /// Fills `out` with captured slots, blocking until either the block is
    /// complete or the driver's block timeout elapses.
    ///
    /// A short return is an underflow event, counted but not an error.
    ///
    /// # Errors
    ///
    /// `CaptureFailure` on peripheral I/O error, or on timeout with zero
    /// samples delivered. The caller counts consecutive failures and
    /// triggers [`BlockReader::reinit`].
    fn read_block(&mut self, out: &mut [i32]) -> Result<usize>;

    /// Tears the peripheral down and brings it back up.
    ///
    /// # Errors
    ///
    /// `CaptureFailure` if the peripheral cannot be re-enabled; the caller
    /// escalates to FATAL.
    fn reinit(&mut self) -> Result<()>;

    /// Snapshot of the driver's overflow/underflow counters.
    fn stats(&self) -> CaptureStats;
}

/// Driver-level event counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames dropped because the driver's internal ring was full.
    pub overflows: u64,
    /// Short block reads.
    pub underflows: u64,
}

/// Shared counter cell behind [`CaptureStats`] snapshots.
#[derive(Debug, Default)]
pub(crate) struct CaptureCounters {
    pub(crate) overflows: AtomicU64,
    pub(crate) underflows: AtomicU64,
}

impl CaptureCounters {
    pub(crate) fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            overflows: self.overflows.load(Ordering::Relaxed),
            underflows: self.underflows.load(Ordering::Relaxed),
        }
    }
}

/// Converts one normalized sample into a 32-bit slot aligned for the
/// configured wire width.
///
/// The alignment matches what the peripheral delivers at each width: 8- and
/// 16-bit data sits in the low bits, 24-bit data in the high bits of the
/// slot (low byte empty), 32-bit uses the full slot.
pub fn slot_from_f32(value: f32, width: BitWidth) -> i32 {
    let v = value.clamp(-1.0, 1.0);
    match width {
        BitWidth::B8 => (v * i8::MAX as f32) as i32,
        BitWidth::B16 => (v * i16::MAX as f32) as i32,
        BitWidth::B24 => ((v * 8_388_607.0) as i32) << 8,
        BitWidth::B32 => (v as f64 * i32::MAX as f64) as i32,
    }
}
