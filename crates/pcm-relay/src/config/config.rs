//! Configuration management for the relay daemon.
//!
//! Loads and saves the TOML snapshot with cross-platform paths and atomic
//! write operations, and maps it onto the pipeline's typed config. Values
//! are range-checked by the pipeline at startup, not at load time, so a
//! misconfigured daemon still starts far enough to log what is wrong.

use crate::{
    AppError, AppResult,
    config::{AudioConfig, BufferConfig, LinkSection, SupervisionSection, TransportSection},
};

use std::net::{IpAddr, SocketAddr};
use std::panic::Location;
use std::time::Duration;
use std::{fs, io::Write, path::PathBuf};

use directories::ProjectDirs;
use error_location::ErrorLocation;
use pcm_relay_core::config::{
    BitWidth, CaptureConfig, LinkConfig, PinMap, PipelineConfig, ProtocolKind, SupervisionConfig,
    TransportConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable overriding the config file path.
const CONFIG_ENV: &str = "PCM_RELAY_CONFIG";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Audio capture settings.
    #[serde(default)]
    pub audio: AudioConfig,
    /// Ring buffer settings.
    #[serde(default)]
    pub buffer: BufferConfig,
    /// Streaming transport settings.
    #[serde(default)]
    pub transport: TransportSection,
    /// Link monitor settings.
    #[serde(default)]
    pub link: LinkSection,
    /// Thresholds and recovery settings.
    #[serde(default)]
    pub supervision: SupervisionSection,
}

impl Config {
    /// Load configuration from disk, creating the default file if not
    /// found.
    #[track_caller]
    #[instrument]
    pub fn load() -> AppResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path).map_err(|e| AppError::ConfigError {
                reason: format!("Failed to read config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

            let config: Config = toml::from_str(&contents).map_err(|e| AppError::ConfigError {
                reason: format!("Failed to parse config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

            info!(config_path = ?config_path, "Configuration loaded");

            Ok(config)
        } else {
            info!("No config found, creating default");
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to disk using the atomic write pattern: write a
    /// temporary file, sync, then rename over the final path.
    #[track_caller]
    #[instrument(skip(self))]
    pub fn save(&self) -> AppResult<()> {
        let config_path = Self::config_path()?;

        let contents = toml::to_string_pretty(self).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let temp_path = config_path.with_extension("toml.tmp");

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to create temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        temp_file
            .write_all(contents.as_bytes())
            .map_err(|e| AppError::ConfigError {
                reason: format!("Failed to write temp config file: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;

        temp_file.sync_all().map_err(|e| AppError::ConfigError {
            reason: format!("Failed to sync temp config file: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        fs::rename(&temp_path, &config_path).map_err(|e| AppError::ConfigError {
            reason: format!("Failed to rename temp config to final: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(config_path = ?config_path, "Configuration saved (atomic write)");

        Ok(())
    }

    /// Maps the TOML snapshot onto the pipeline's typed config.
    ///
    /// # Errors
    ///
    /// `ConfigError` on an unknown protocol, bit depth or a malformed
    /// collector address.
    #[track_caller]
    pub fn to_pipeline(&self) -> AppResult<PipelineConfig> {
        let bit_width = match self.audio.bit_depth {
            8 => BitWidth::B8,
            16 => BitWidth::B16,
            24 => BitWidth::B24,
            32 => BitWidth::B32,
            other => {
                return Err(AppError::ConfigError {
                    reason: format!("unsupported bit depth: {}", other),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let protocol = match self.transport.protocol.as_str() {
            "tcp" => ProtocolKind::Reliable,
            "udp" => ProtocolKind::Datagram,
            other => {
                return Err(AppError::ConfigError {
                    reason: format!("unknown protocol: {:?} (expected \"tcp\" or \"udp\")", other),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        let ip: IpAddr = self
            .transport
            .server_ip
            .parse()
            .map_err(|e| AppError::ConfigError {
                reason: format!("bad server ip {:?}: {}", self.transport.server_ip, e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let endpoint = SocketAddr::new(ip, self.transport.port);

        Ok(PipelineConfig {
            capture: CaptureConfig {
                sample_rate: self.audio.sample_rate,
                bit_width,
                channels: self.audio.channels,
                block_samples: self.audio.block_samples,
                ring_descriptors: self.audio.ring_descriptors,
                read_timeout: Duration::from_millis(self.audio.read_timeout_ms),
                pins: PinMap {
                    bclk: self.audio.pins.bclk,
                    ws: self.audio.pins.ws,
                    din: self.audio.pins.din,
                },
            },
            ring_bytes: self.buffer.ring_kib * 1024,
            transport: TransportConfig {
                protocol,
                endpoint,
                batch_samples: self.transport.batch_samples,
                connect_attempts: self.transport.connect_attempts,
                connect_backoff: Duration::from_millis(self.transport.connect_backoff_ms),
            },
            link: LinkConfig {
                probe_interval: Duration::from_millis(self.link.probe_interval_ms),
                max_link_losses: self.link.max_link_losses,
                ntp_server: self.link.ntp_server.clone(),
                ntp_resync_interval: Duration::from_secs(self.link.ntp_resync_interval_secs),
            },
            supervision: SupervisionConfig {
                watchdog_timeout: Duration::from_secs(self.supervision.watchdog_timeout_secs),
                stats_interval: Duration::from_secs(self.supervision.stats_interval_secs),
                max_capture_failures: self.supervision.max_capture_failures,
                max_ring_overflows: self.supervision.max_ring_overflows,
                overflow_cooldown: Duration::from_millis(self.supervision.overflow_cooldown_ms),
                reconnect_backoff: Duration::from_millis(self.supervision.reconnect_backoff_ms),
                max_reconnect_backoff: Duration::from_millis(
                    self.supervision.max_reconnect_backoff_ms,
                ),
                max_reconnect_attempts: self.supervision.max_reconnect_attempts,
                auto_reboot: self.supervision.auto_reboot,
                min_free_memory_kib: self.supervision.min_free_memory_kib,
                startup_delay: Duration::from_secs(self.supervision.startup_delay_secs),
                capture_core: self.supervision.capture_core,
                transmit_core: self.supervision.transmit_core,
                capture_priority: self.supervision.capture_priority,
                transmit_priority: self.supervision.transmit_priority,
            },
        })
    }

    /// Directory for runtime data: the fatal record and log files.
    #[track_caller]
    pub fn data_dir() -> AppResult<PathBuf> {
        let proj_dirs = Self::project_dirs()?;
        let data_dir = proj_dirs.data_dir().to_path_buf();
        if !data_dir.exists() {
            fs::create_dir_all(&data_dir)?;
            debug!(data_dir = ?data_dir, "Created data directory");
        }
        Ok(data_dir)
    }

    #[track_caller]
    fn config_path() -> AppResult<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let proj_dirs = Self::project_dirs()?;
        let config_dir = proj_dirs.config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir)?;
            debug!(config_dir = ?config_dir, "Created config directory");
        }

        Ok(config_dir.join("config.toml"))
    }

    #[track_caller]
    fn project_dirs() -> AppResult<ProjectDirs> {
        ProjectDirs::from("com", "pcm-relay", "PCM-Relay").ok_or_else(|| AppError::ConfigError {
            reason: "Failed to get project directories".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
