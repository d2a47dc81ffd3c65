//! Deterministic sine source: a drop-in reader for bring-up without a wired
//! microphone, and for exercising the pipeline in tests.

use crate::capture::{BlockReader, CaptureStats, slot_from_f32};
use crate::config::BitWidth;
use crate::Result;

use std::f32::consts::TAU;
use std::time::Duration;

/// Generates a fixed-frequency tone, one block per call.
pub struct SineReader {
    sample_rate: u32,
    frequency: f32,
    amplitude: f32,
    width: BitWidth,
    phase: f32,
    /// When set, each read sleeps for the block's real-time duration so the
    /// source delivers at capture speed.
    paced: bool,
}

impl SineReader {
    /// A full-speed source; reads return immediately.
    pub fn new(sample_rate: u32, frequency: f32, amplitude: f32, width: BitWidth) -> Self {
        Self {
            sample_rate,
            frequency,
            amplitude,
            width,
            phase: 0.0,
            paced: false,
        }
    }

    /// A source that delivers blocks at real-time capture speed.
    pub fn paced(sample_rate: u32, frequency: f32, amplitude: f32, width: BitWidth) -> Self {
        Self {
            paced: true,
            ..Self::new(sample_rate, frequency, amplitude, width)
        }
    }
}

impl BlockReader for SineReader {
    fn read_block(&mut self, out: &mut [i32]) -> Result<usize> {
        let step = TAU * self.frequency / self.sample_rate as f32;
        for slot in out.iter_mut() {
            *slot = slot_from_f32(self.amplitude * self.phase.sin(), self.width);
            self.phase += step;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
        if self.paced {
            let nanos = out.len() as u64 * 1_000_000_000 / self.sample_rate as u64;
            std::thread::sleep(Duration::from_nanos(nanos));
        }
        Ok(out.len())
    }

    fn reinit(&mut self) -> Result<()> {
        self.phase = 0.0;
        Ok(())
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats::default()
    }
}
