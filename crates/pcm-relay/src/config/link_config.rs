use serde::{Deserialize, Serialize};

/// Link monitor and time sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSection {
    /// Interval between route probes, in milliseconds.
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    /// Failed probes after a loss before escalation.
    #[serde(default = "default_max_link_losses")]
    pub max_link_losses: u32,
    /// SNTP server, `host:port`.
    #[serde(default = "default_ntp_server")]
    pub ntp_server: String,
    /// Seconds between wall-clock resyncs.
    #[serde(default = "default_ntp_resync_interval_secs")]
    pub ntp_resync_interval_secs: u64,
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            probe_interval_ms: default_probe_interval_ms(),
            max_link_losses: default_max_link_losses(),
            ntp_server: default_ntp_server(),
            ntp_resync_interval_secs: default_ntp_resync_interval_secs(),
        }
    }
}

fn default_probe_interval_ms() -> u64 {
    2000
}

fn default_max_link_losses() -> u32 {
    20
}

fn default_ntp_server() -> String {
    "pool.ntp.org:123".to_string()
}

fn default_ntp_resync_interval_secs() -> u64 {
    3600
}
