use crate::config::{DEFAULT_SERVER_IP, DEFAULT_TCP_PORT};

use serde::{Deserialize, Serialize};

/// Streaming transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSection {
    /// `"tcp"` (reliable stream) or `"udp"` (sequenced datagrams).
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Collector IP address.
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    /// Collector port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Samples per transmit batch.
    #[serde(default = "default_batch_samples")]
    pub batch_samples: usize,
    /// Immediate connect attempts before giving up.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// First connect retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_connect_backoff_ms")]
    pub connect_backoff_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            server_ip: default_server_ip(),
            port: default_port(),
            batch_samples: default_batch_samples(),
            connect_attempts: default_connect_attempts(),
            connect_backoff_ms: default_connect_backoff_ms(),
        }
    }
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_server_ip() -> String {
    DEFAULT_SERVER_IP.to_string()
}

fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_batch_samples() -> usize {
    4096
}

fn default_connect_attempts() -> u32 {
    5
}

fn default_connect_backoff_ms() -> u64 {
    2000
}
