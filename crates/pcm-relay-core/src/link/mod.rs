//! Network link supervision and wall-clock sync.
//!
//! The host OS owns the interface; this monitor watches whether a route to
//! the collector exists, mirrors the stack's `{started, got-ip,
//! disconnected}` events as `{Connecting, Up, Down}` transitions, and keeps
//! a best-effort wall clock for log and packet timestamps. Losing the link
//! schedules re-probes automatically; staying down past the configured
//! budget escalates to FATAL through the ledger.

mod clock;

pub use clock::WallClock;

use crate::config::LinkConfig;
use crate::ledger::ErrorLedger;
use crate::{ErrorKind, PipelineError, Result, Severity};

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use error_location::ErrorLocation;
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

const MODULE: &str = "link";
const INIT_PROBE_INTERVAL: Duration = Duration::from_millis(500);
const INIT_PROBE_RETRIES: u32 = 20;

/// Link states, translated from the underlying stack's events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No route to the collector.
    Down,
    /// Bring-up in progress.
    Connecting,
    /// Address bound and route present.
    Up,
}

impl LinkState {
    fn encode(self) -> u8 {
        match self {
            Self::Down => 0,
            Self::Connecting => 1,
            Self::Up => 2,
        }
    }

    fn decode(v: u8) -> Self {
        match v {
            2 => Self::Up,
            1 => Self::Connecting,
            _ => Self::Down,
        }
    }
}

struct LinkShared {
    state: AtomicU8,
    /// Failed probes since the link was last Up.
    losses: AtomicU32,
    /// Set once the loss budget has been spent, so FATAL is recorded once
    /// per outage.
    escalated: AtomicBool,
    shutdown: AtomicBool,
}

/// Watches the route to the collector and owns the wall clock.
pub struct LinkMonitor {
    shared: Arc<LinkShared>,
    clock: Arc<WallClock>,
    config: LinkConfig,
    target: SocketAddr,
    probe_thread: Mutex<Option<JoinHandle<()>>>,
}

impl LinkMonitor {
    /// Brings the link view up: probes until a route to `target` exists
    /// (bounded retries), then starts the background probe loop.
    ///
    /// # Errors
    ///
    /// `InitFailed` when no route appears within the retry budget.
    #[track_caller]
    #[instrument(skip(config, ledger), fields(target = %target))]
    pub fn init(
        config: LinkConfig,
        target: SocketAddr,
        ledger: Arc<ErrorLedger>,
    ) -> Result<Arc<Self>> {
        let shared = Arc::new(LinkShared {
            state: AtomicU8::new(LinkState::Connecting.encode()),
            losses: AtomicU32::new(0),
            escalated: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });

        let mut bound = false;
        for attempt in 1..=INIT_PROBE_RETRIES {
            if route_exists(target) {
                bound = true;
                break;
            }
            warn!(attempt, retries = INIT_PROBE_RETRIES, "No route yet");
            std::thread::sleep(INIT_PROBE_INTERVAL);
        }
        if !bound {
            return Err(PipelineError::InitFailed {
                what: format!("no route to {} after {} probes", target, INIT_PROBE_RETRIES),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        shared.state.store(LinkState::Up.encode(), Ordering::Release);
        info!("Link up");

        let monitor = Arc::new(Self {
            shared: Arc::clone(&shared),
            clock: Arc::new(WallClock::new()),
            config,
            target,
            probe_thread: Mutex::new(None),
        });

        let thread = {
            let shared = Arc::clone(&shared);
            let config = monitor.config.clone();
            let ledger = Arc::clone(&ledger);
            std::thread::Builder::new()
                .name("link-probe".to_string())
                .spawn(move || probe_loop(shared, config, target, ledger))
                .map_err(|e| PipelineError::InitFailed {
                    what: format!("link probe thread: {}", e),
                    location: ErrorLocation::from(Location::caller()),
                })?
        };
        *monitor.probe_thread.lock() = Some(thread);

        Ok(monitor)
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        LinkState::decode(self.shared.state.load(Ordering::Acquire))
    }

    /// Whether the link is currently Up.
    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Up
    }

    /// Forces an immediate re-probe instead of waiting for the next cycle.
    ///
    /// # Errors
    ///
    /// `NetworkFailed` when the route is still absent.
    #[track_caller]
    pub fn reconnect(&self) -> Result<()> {
        info!("Link reconnect requested");
        if apply_probe(&self.shared, self.target) {
            Ok(())
        } else {
            Err(PipelineError::NetworkFailed {
                reason: format!("no route to {}", self.target),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }

    /// First wall-clock sync. Best effort: on failure the clock stays at
    /// the known-safe epoch floor so timestamps remain monotonic across
    /// boots.
    pub fn init_time_sync(&self) {
        self.resync_time();
    }

    /// Re-queries the configured SNTP server and updates the clock offset.
    pub fn resync_time(&self) {
        self.clock.sync(&self.config.ntp_server);
    }

    /// The monitor's wall clock.
    pub fn clock(&self) -> Arc<WallClock> {
        Arc::clone(&self.clock)
    }

    /// Current wall-clock time, floored at the safe epoch.
    pub fn now_wallclock(&self) -> std::time::SystemTime {
        self.clock.now()
    }

    /// Stops the probe loop and joins it.
    pub fn deinit(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.probe_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

fn probe_loop(
    shared: Arc<LinkShared>,
    config: LinkConfig,
    target: SocketAddr,
    ledger: Arc<ErrorLedger>,
) {
    while !shared.shutdown.load(Ordering::Acquire) {
        sleep_watching_shutdown(config.probe_interval, &shared);
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        if !apply_probe(&shared, target) {
            let losses = shared.losses.load(Ordering::Relaxed);
            if losses > config.max_link_losses
                && !shared.escalated.swap(true, Ordering::AcqRel)
            {
                ledger.record(
                    ErrorKind::NetworkFailed,
                    Severity::Fatal,
                    MODULE,
                    &format!("link down after {} failed probes", losses),
                );
            }
        }
    }
}

/// Probes once and folds the outcome into the shared state. Returns whether
/// the link is up.
fn apply_probe(shared: &LinkShared, target: SocketAddr) -> bool {
    let was = LinkState::decode(shared.state.load(Ordering::Acquire));
    let up = route_exists(target);

    match (was, up) {
        (LinkState::Up, false) => {
            shared.state.store(LinkState::Down.encode(), Ordering::Release);
            shared.losses.fetch_add(1, Ordering::Relaxed);
            warn!("Link lost");
        }
        (LinkState::Up, true) => {}
        (_, true) => {
            shared.state.store(LinkState::Up.encode(), Ordering::Release);
            shared.losses.store(0, Ordering::Relaxed);
            shared.escalated.store(false, Ordering::Release);
            info!("Link recovered");
        }
        (_, false) => {
            shared.losses.fetch_add(1, Ordering::Relaxed);
        }
    }

    up
}

fn sleep_watching_shutdown(total: Duration, shared: &LinkShared) {
    let deadline = std::time::Instant::now() + total;
    while std::time::Instant::now() < deadline {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        let left = deadline.saturating_duration_since(std::time::Instant::now());
        std::thread::sleep(left.min(Duration::from_millis(50)));
    }
}

/// Whether the host currently has a route toward `target`. Binding and
/// "connecting" a datagram socket consults the routing table without
/// emitting a packet.
fn route_exists(target: SocketAddr) -> bool {
    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    match UdpSocket::bind(local) {
        Ok(socket) => socket.connect(target).is_ok(),
        Err(_) => false,
    }
}
