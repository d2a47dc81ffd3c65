use serde::{Deserialize, Serialize};

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz (8000..=96000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Wire sample width in bits: 8, 16, 24 or 32.
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u8,
    /// Channel count (1 or 2); only the left slot is captured.
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Samples per capture block.
    #[serde(default = "default_block_samples")]
    pub block_samples: usize,
    /// Descriptors in the driver's internal frame ring.
    #[serde(default = "default_ring_descriptors")]
    pub ring_descriptors: usize,
    /// Deadline for one block read, in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Microphone wiring.
    #[serde(default)]
    pub pins: PinConfig,
}

/// GPIO wiring of the microphone (XIAO ESP32S3 defaults).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinConfig {
    /// Bit clock GPIO.
    pub bclk: u8,
    /// Word select GPIO.
    pub ws: u8,
    /// Data-in GPIO.
    pub din: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self { bclk: 2, ws: 3, din: 1 }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            bit_depth: default_bit_depth(),
            channels: default_channels(),
            block_samples: default_block_samples(),
            ring_descriptors: default_ring_descriptors(),
            read_timeout_ms: default_read_timeout_ms(),
            pins: PinConfig::default(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16_000
}

fn default_bit_depth() -> u8 {
    16
}

fn default_channels() -> u16 {
    1
}

fn default_block_samples() -> usize {
    512
}

fn default_ring_descriptors() -> usize {
    8
}

fn default_read_timeout_ms() -> u64 {
    50
}
