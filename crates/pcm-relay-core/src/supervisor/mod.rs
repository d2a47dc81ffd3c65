//! The supervisor: a 1 s health loop over everything else.
//!
//! Each tick it walks the same checklist the device carries in the field:
//! link transitions, task liveness, the periodic statistics roll-up with
//! memory and CPU readings, the overflow cooldown, and the hourly wall-clock
//! resync. It never touches the transport directly; reconnects are requested
//! over the transmit task's channel.

use crate::config::SupervisionConfig;
use crate::ledger::ErrorLedger;
use crate::link::{LinkMonitor, LinkState};
use crate::pipeline::{ReconnectRequest, Vitals};
use crate::ring::SampleRing;
use crate::transport::TransportCounters;
use crate::{ErrorKind, Severity};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::time::Duration;

use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info, warn};

const MODULE: &str = "supervisor";
const TICK: Duration = Duration::from_secs(1);
/// Settle time between link recovery and the forced transport reconnect.
const LINK_SETTLE: Duration = Duration::from_secs(2);

/// Periodic health checker for the whole pipeline.
pub struct Supervisor {
    link: Arc<LinkMonitor>,
    vitals: Arc<Vitals>,
    counters: Arc<TransportCounters>,
    ledger: Arc<ErrorLedger>,
    ring: Arc<SampleRing>,
    reconnect_tx: SyncSender<ReconnectRequest>,
    config: SupervisionConfig,
    resync_interval: Duration,
    system: System,
    prev_link: LinkState,
    ticks_since_stats: u32,
    ticks_since_resync: u64,
    /// Low-water mark of available memory, KiB.
    min_available_kib: u64,
    capture_reported: bool,
    transmit_reported: bool,
}

impl Supervisor {
    /// Wires the supervisor to its observees.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        link: Arc<LinkMonitor>,
        vitals: Arc<Vitals>,
        counters: Arc<TransportCounters>,
        ledger: Arc<ErrorLedger>,
        ring: Arc<SampleRing>,
        reconnect_tx: SyncSender<ReconnectRequest>,
        config: SupervisionConfig,
        resync_interval: Duration,
    ) -> Self {
        let prev_link = link.state();
        Self {
            link,
            vitals,
            counters,
            ledger,
            ring,
            reconnect_tx,
            config,
            resync_interval,
            system: System::new(),
            prev_link,
            ticks_since_stats: 0,
            ticks_since_resync: 0,
            min_available_kib: u64::MAX,
            capture_reported: false,
            transmit_reported: false,
        }
    }

    /// Runs the 1 s loop until `shutdown`.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("Supervisor started");
        while !shutdown.load(Ordering::Acquire) {
            std::thread::sleep(TICK);
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            self.tick();
        }
        info!("Supervisor stopped");
    }

    /// One pass over the checklist. Public so recovery scenarios can be
    /// driven tick by tick in tests.
    pub fn tick(&mut self) {
        self.check_link();
        self.check_liveness();

        self.ticks_since_stats += 1;
        if u64::from(self.ticks_since_stats) >= self.config.stats_interval.as_secs() {
            self.ticks_since_stats = 0;
            self.roll_up_stats();
            self.cooldown_overflows();
        }

        self.ticks_since_resync += 1;
        if self.ticks_since_resync >= self.resync_interval.as_secs() {
            self.ticks_since_resync = 0;
            if self.link.is_connected() {
                self.link.resync_time();
            }
        }
    }

    fn check_link(&mut self) {
        let current = self.link.state();
        match (self.prev_link, current) {
            (LinkState::Up, LinkState::Up) => {}
            (LinkState::Up, _) => {
                warn!("Link lost, attempting reconnect");
                let _ = self.link.reconnect();
            }
            (_, LinkState::Up) => {
                info!("Link recovered, forcing transport reconnect");
                std::thread::sleep(LINK_SETTLE);
                let _ = self.reconnect_tx.try_send(ReconnectRequest {
                    reason: "link recovered",
                });
            }
            _ => {
                // Still down, keep trying.
                let _ = self.link.reconnect();
            }
        }
        self.prev_link = current;
    }

    fn check_liveness(&mut self) {
        let timeout = self.config.watchdog_timeout;

        let capture_age = self.vitals.capture_age();
        if capture_age > timeout && !self.capture_reported {
            self.capture_reported = true;
            self.ledger.record(
                ErrorKind::Timeout,
                Severity::Fatal,
                MODULE,
                &format!("capture task silent for {} s", capture_age.as_secs()),
            );
        }

        let transmit_age = self.vitals.transmit_age();
        if transmit_age > timeout && !self.transmit_reported {
            self.transmit_reported = true;
            self.ledger.record(
                ErrorKind::Timeout,
                Severity::Fatal,
                MODULE,
                &format!("transmit task silent for {} s", transmit_age.as_secs()),
            );
        }
    }

    fn roll_up_stats(&mut self) {
        let transport = self.counters.snapshot();
        info!(
            bytes_sent = transport.bytes_sent,
            reconnects = transport.reconnects,
            packets_sent = transport.packets_sent,
            lost_packets = transport.lost_packets,
            overflows = self.vitals.overflow_count(),
            ring_usage = self.ring.usage_percent().unwrap_or(0),
            "Statistics"
        );

        self.system.refresh_memory();
        let available_kib = self.system.available_memory() / 1024;
        self.min_available_kib = self.min_available_kib.min(available_kib);
        if available_kib < self.config.min_free_memory_kib {
            warn!(
                available_kib,
                min_available_kib = self.min_available_kib,
                "LOW MEMORY"
            );
        } else {
            debug!(
                available_kib,
                min_available_kib = self.min_available_kib,
                "Memory headroom"
            );
        }

        if let Ok(pid) = sysinfo::get_current_pid() {
            self.system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
            if let Some(process) = self.system.process(pid) {
                debug!(
                    rss_kib = process.memory() / 1024,
                    cpu_percent = process.cpu_usage(),
                    "Process usage"
                );
            }
        }
    }

    fn cooldown_overflows(&self) {
        if self.vitals.overflow_count() == 0 {
            return;
        }
        if let Some(age) = self.vitals.last_overflow_age() {
            if age > self.config.overflow_cooldown {
                debug!("Overflow cooldown elapsed, counter reset");
                self.vitals.clear_overflows();
            }
        }
    }
}
