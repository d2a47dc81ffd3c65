use crate::config::Config;

use std::time::Duration;

use pcm_relay_core::config::{BitWidth, ProtocolKind};

/// WHAT: The default snapshot maps onto a valid pipeline config
/// WHY: A fresh install must come up on defaults alone
#[test]
fn given_default_config_when_mapped_then_pipeline_config_validates() {
    let config = Config::default();
    let pipeline = config.to_pipeline().unwrap();

    pipeline.validate().unwrap();
    assert_eq!(pipeline.capture.sample_rate, 16_000);
    assert_eq!(pipeline.capture.bit_width, BitWidth::B16);
    assert_eq!(pipeline.capture.block_samples, 512);
    assert_eq!(pipeline.ring_bytes, 48 * 1024);
    assert_eq!(pipeline.transport.protocol, ProtocolKind::Reliable);
    assert_eq!(pipeline.transport.batch_samples, 4096);
    assert_eq!(
        pipeline.supervision.reconnect_backoff,
        Duration::from_millis(1000)
    );
    assert_eq!(
        pipeline.supervision.max_reconnect_backoff,
        Duration::from_millis(30_000)
    );
    assert_eq!(pipeline.supervision.max_reconnect_attempts, 10);
    assert!(pipeline.supervision.auto_reboot);
}

/// WHAT: A partial TOML file fills missing fields from the defaults
/// WHY: Operators override only what they need
#[test]
fn given_partial_toml_when_parsed_then_defaults_fill_gaps() {
    let toml = r#"
        [transport]
        protocol = "udp"
        server_ip = "10.0.0.7"
        port = 9001

        [audio]
        sample_rate = 48000
        bit_depth = 24
    "#;
    let config: Config = toml::from_str(toml).unwrap();
    let pipeline = config.to_pipeline().unwrap();

    assert_eq!(pipeline.transport.protocol, ProtocolKind::Datagram);
    assert_eq!(
        pipeline.transport.endpoint,
        "10.0.0.7:9001".parse().unwrap()
    );
    assert_eq!(pipeline.capture.sample_rate, 48_000);
    assert_eq!(pipeline.capture.bit_width, BitWidth::B24);
    // Untouched sections keep their defaults.
    assert_eq!(pipeline.supervision.max_capture_failures, 100);
    assert_eq!(pipeline.link.ntp_resync_interval, Duration::from_secs(3600));
}

/// WHAT: The full snapshot round-trips through TOML
/// WHY: Saving and reloading must not drift values
#[test]
fn given_config_when_serialized_then_round_trip_is_lossless() {
    let mut config = Config::default();
    config.audio.sample_rate = 22_050;
    config.transport.batch_samples = 2048;
    config.supervision.auto_reboot = false;

    let serialized = toml::to_string_pretty(&config).unwrap();
    let reloaded: Config = toml::from_str(&serialized).unwrap();

    assert_eq!(reloaded.audio.sample_rate, 22_050);
    assert_eq!(reloaded.transport.batch_samples, 2048);
    assert!(!reloaded.supervision.auto_reboot);
}

/// WHAT: Unknown protocol names are rejected at mapping time
/// WHY: A typo must fail loudly, not fall back to a default transport
#[test]
fn given_unknown_protocol_when_mapped_then_error() {
    let mut config = Config::default();
    config.transport.protocol = "sctp".to_string();
    assert!(config.to_pipeline().is_err());
}

/// WHAT: Unsupported bit depths are rejected at mapping time
/// WHY: The wire packing only exists for 8/16/24/32
#[test]
fn given_unsupported_bit_depth_when_mapped_then_error() {
    let mut config = Config::default();
    config.audio.bit_depth = 20;
    assert!(config.to_pipeline().is_err());
}

/// WHAT: A malformed collector address is rejected at mapping time
/// WHY: The endpoint must be a literal IP; DNS is not part of the snapshot
#[test]
fn given_bad_server_ip_when_mapped_then_error() {
    let mut config = Config::default();
    config.transport.server_ip = "collector.local".to_string();
    assert!(config.to_pipeline().is_err());
}

/// WHAT: Out-of-range values pass mapping but fail pipeline validation
/// WHY: Range checks live in one place, the pipeline's validate
#[test]
fn given_out_of_range_rate_when_validated_then_invalid_config() {
    let mut config = Config::default();
    config.audio.sample_rate = 4000;
    let pipeline = config.to_pipeline().unwrap();
    assert!(pipeline.validate().is_err());
}
