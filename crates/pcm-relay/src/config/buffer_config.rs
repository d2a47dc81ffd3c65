use serde::{Deserialize, Serialize};

/// Ring buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Ring capacity in KiB. 48 KiB fits the target's fragmented memory
    /// after the network stack initializes.
    #[serde(default = "default_ring_kib")]
    pub ring_kib: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            ring_kib: default_ring_kib(),
        }
    }
}

fn default_ring_kib() -> usize {
    48
}
