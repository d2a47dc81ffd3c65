use crate::config::LinkConfig;
use crate::ledger::ErrorLedger;
use crate::link::{LinkMonitor, LinkState, WallClock};
use crate::tests::support::RecordingHook;

use std::net::UdpSocket;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn test_link_config() -> LinkConfig {
    LinkConfig {
        probe_interval: Duration::from_millis(50),
        max_link_losses: 3,
        ntp_server: "127.0.0.1:123".to_string(),
        ntp_resync_interval: Duration::from_secs(3600),
    }
}

/// WHAT: Init succeeds against a loopback target and reports Up
/// WHY: A bound address with a route is the init contract
#[test]
fn given_loopback_target_when_initialized_then_link_is_up() {
    let (hook, _) = RecordingHook::new();
    let ledger = ErrorLedger::new_immediate(false, None, hook);

    let monitor =
        LinkMonitor::init(test_link_config(), "127.0.0.1:9".parse().unwrap(), ledger).unwrap();

    assert_eq!(monitor.state(), LinkState::Up);
    assert!(monitor.is_connected());
    monitor.reconnect().unwrap();
    monitor.deinit();
}

/// WHAT: The unsynced clock never reads before the safe epoch
/// WHY: Log timestamps must stay monotonic across boots even without NTP
#[test]
fn given_unsynced_clock_when_reading_then_floor_applies() {
    let clock = WallClock::new();
    assert!(!clock.is_synced());

    let floor = UNIX_EPOCH + Duration::from_secs(1_735_689_600);
    assert!(clock.now() >= floor);
}

/// WHAT: A valid SNTP reply marks the clock synced with a sane offset
/// WHY: Time sync is the only wall-clock source the pipeline trusts
#[test]
fn given_mock_sntp_server_when_syncing_then_clock_is_synced() {
    let server = UdpSocket::bind("127.0.0.1:0").unwrap();
    server
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let addr = server.local_addr().unwrap();

    let responder = std::thread::spawn(move || {
        let mut buf = [0u8; 48];
        let (_, peer) = server.recv_from(&mut buf).unwrap();

        let mut reply = [0u8; 48];
        reply[0] = 0b0010_0100; // version 4, mode 4 (server)
        reply[1] = 2; // stratum
        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let ntp_secs = (now_unix + 2_208_988_800) as u32;
        reply[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
        server.send_to(&reply, peer).unwrap();
    });

    let clock = WallClock::new();
    clock.sync(&addr.to_string());
    responder.join().unwrap();

    assert!(clock.is_synced());
    // Offset against the same host clock is sub-second.
    let skew = clock
        .now()
        .duration_since(SystemTime::now())
        .unwrap_or_default();
    assert!(skew < Duration::from_secs(2));
}
