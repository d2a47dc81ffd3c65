use serde::{Deserialize, Serialize};

/// Thresholds, recovery knobs and scheduling hints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisionSection {
    /// Seconds a task may go without feeding before it is declared dead.
    #[serde(default = "default_watchdog_timeout_secs")]
    pub watchdog_timeout_secs: u64,
    /// Seconds between statistics roll-ups.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    /// Consecutive capture failures before a driver reinit.
    #[serde(default = "default_max_capture_failures")]
    pub max_capture_failures: u32,
    /// Counted overflows before the emergency buffer drain.
    #[serde(default = "default_max_ring_overflows")]
    pub max_ring_overflows: u32,
    /// Milliseconds of quiet before the overflow counter resets.
    #[serde(default = "default_overflow_cooldown_ms")]
    pub overflow_cooldown_ms: u64,
    /// First transmit retry delay after a send failure, in milliseconds.
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    /// Ceiling for the doubled retry delay, in milliseconds.
    #[serde(default = "default_max_reconnect_backoff_ms")]
    pub max_reconnect_backoff_ms: u64,
    /// Failed reconnects before the pipeline escalates to FATAL.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Whether FATAL conditions restart the process.
    #[serde(default = "default_auto_reboot")]
    pub auto_reboot: bool,
    /// Warn when available memory falls below this many KiB.
    #[serde(default = "default_min_free_memory_kib")]
    pub min_free_memory_kib: u64,
    /// Seconds the transmit task waits at startup for the ring to fill.
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,
    /// CPU to pin the capture task to.
    #[serde(default)]
    pub capture_core: Option<usize>,
    /// CPU to pin the transmit and supervisor tasks to.
    #[serde(default)]
    pub transmit_core: Option<usize>,
    /// Realtime priority for the capture task (1-99).
    #[serde(default = "default_capture_priority")]
    pub capture_priority: Option<u8>,
    /// Realtime priority for the transmit task (1-99).
    #[serde(default = "default_transmit_priority")]
    pub transmit_priority: Option<u8>,
}

impl Default for SupervisionSection {
    fn default() -> Self {
        Self {
            watchdog_timeout_secs: default_watchdog_timeout_secs(),
            stats_interval_secs: default_stats_interval_secs(),
            max_capture_failures: default_max_capture_failures(),
            max_ring_overflows: default_max_ring_overflows(),
            overflow_cooldown_ms: default_overflow_cooldown_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            max_reconnect_backoff_ms: default_max_reconnect_backoff_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            auto_reboot: default_auto_reboot(),
            min_free_memory_kib: default_min_free_memory_kib(),
            startup_delay_secs: default_startup_delay_secs(),
            capture_core: None,
            transmit_core: None,
            capture_priority: default_capture_priority(),
            transmit_priority: default_transmit_priority(),
        }
    }
}

fn default_watchdog_timeout_secs() -> u64 {
    60
}

fn default_stats_interval_secs() -> u64 {
    10
}

fn default_max_capture_failures() -> u32 {
    100
}

fn default_max_ring_overflows() -> u32 {
    20
}

fn default_overflow_cooldown_ms() -> u64 {
    5000
}

fn default_reconnect_backoff_ms() -> u64 {
    1000
}

fn default_max_reconnect_backoff_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_auto_reboot() -> bool {
    true
}

fn default_min_free_memory_kib() -> u64 {
    20_480
}

fn default_startup_delay_secs() -> u64 {
    5
}

fn default_capture_priority() -> Option<u8> {
    Some(10)
}

fn default_transmit_priority() -> Option<u8> {
    Some(8)
}
