//! The transmit task: drains the ring in batches and ships them, owning the
//! transport and its reconnect ladder.
//!
//! The supervisor never touches the socket; its reconnect requests arrive
//! over a bounded channel drained at the top of each iteration, so at most
//! one thread holds the transport at any time.

use crate::config::SupervisionConfig;
use crate::ledger::ErrorLedger;
use crate::pipeline::{Backoff, Vitals};
use crate::ring::SampleRing;
use crate::transport::Transport;
use crate::{ErrorKind, Result, Severity};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

const MODULE: &str = "transmit";
/// Ceiling on one wait for the ring to fill.
const WAIT_BUDGET: Duration = Duration::from_secs(2);
/// Cooperative sleep while waiting for the ring.
const WAIT_POLL: Duration = Duration::from_millis(20);
const EMPTY_PAUSE: Duration = Duration::from_millis(10);
/// End-of-iteration yield so lower-priority tasks always progress.
const YIELD_PAUSE: Duration = Duration::from_millis(1);

/// A supervisor-issued request to cycle the connection.
#[derive(Debug, Clone)]
pub struct ReconnectRequest {
    /// Why the supervisor asked (logged, nothing else).
    pub reason: &'static str,
}

/// Per-iteration state machine of the transmit loop.
pub struct TransmitTask<T: Transport> {
    transport: T,
    ring: Arc<SampleRing>,
    vitals: Arc<Vitals>,
    ledger: Arc<ErrorLedger>,
    requests: Receiver<ReconnectRequest>,
    backoff: Backoff,
    max_attempts: u32,
    batch: Vec<i32>,
    batch_min: usize,
}

impl<T: Transport> TransmitTask<T> {
    /// Builds the task around an already-opened transport. The batch
    /// scratch is allocated here, once, and reused for every send.
    pub fn new(
        transport: T,
        batch_samples: usize,
        ring: Arc<SampleRing>,
        vitals: Arc<Vitals>,
        ledger: Arc<ErrorLedger>,
        requests: Receiver<ReconnectRequest>,
        supervision: &SupervisionConfig,
    ) -> Self {
        Self {
            transport,
            ring,
            vitals,
            ledger,
            requests,
            backoff: Backoff::new(
                supervision.reconnect_backoff,
                supervision.max_reconnect_backoff,
            ),
            max_attempts: supervision.max_reconnect_attempts,
            batch: vec![0i32; batch_samples],
            batch_min: (batch_samples / 4).max(1),
        }
    }

    /// Runs until `shutdown` or a fatal condition. `startup_delay` lets the
    /// ring fill before the first drain.
    pub fn run(mut self, shutdown: &AtomicBool, startup_delay: Duration) {
        info!("Transmit task started, waiting for initial buffer fill");
        sleep_interruptible(startup_delay, shutdown);

        while !shutdown.load(Ordering::Acquire) {
            if self.poll_once(shutdown).is_err() {
                error!("Transmit task stopping on fatal condition");
                break;
            }
        }
        self.transport.close();
        info!("Transmit task stopped");
    }

    /// One loop iteration. `Err` means a fatal condition was recorded and
    /// the task must stop.
    pub fn poll_once(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.drain_requests();
        self.wait_for_batch(shutdown);

        let got = match self.ring.read(&mut self.batch) {
            Ok(n) => n,
            Err(e) => {
                self.ledger.record_error(Severity::Fatal, MODULE, &e);
                return Err(e);
            }
        };
        if got == 0 {
            std::thread::sleep(EMPTY_PAUSE);
            return Ok(());
        }

        match self.transport.send(&self.batch[..got]) {
            Ok(()) => {
                self.backoff.on_success();
                self.vitals.feed_transmit();
            }
            Err(e) => {
                self.ledger.record(
                    ErrorKind::TransportFailure,
                    Severity::Error,
                    MODULE,
                    &e.to_string(),
                );
                self.retry(shutdown)?;
            }
        }

        match self.ring.check_overflow_and_clear() {
            Ok(true) => warn!("Ring buffer has been dropping samples"),
            Ok(false) => {}
            Err(e) => {
                self.ledger.record_error(Severity::Fatal, MODULE, &e);
                return Err(e);
            }
        }

        std::thread::sleep(YIELD_PAUSE);
        Ok(())
    }

    /// Backoff-then-reconnect after a failed send. The watchdog is fed
    /// around the long sleeps so a healthy retry ladder is never mistaken
    /// for a hung task.
    fn retry(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let delay = self.backoff.delay();
        info!(
            delay_ms = delay.as_millis() as u64,
            attempts = self.backoff.attempts(),
            "Backing off before reconnect"
        );
        sleep_interruptible(delay, shutdown);
        self.vitals.feed_transmit();

        match self.transport.reconnect() {
            Ok(()) => {
                info!("Transport reconnected");
                self.backoff.on_success();
            }
            Err(e) => {
                self.backoff.on_failure();
                warn!(
                    attempts = self.backoff.attempts(),
                    max = self.max_attempts,
                    error = %e,
                    "Reconnect failed"
                );
                if self.backoff.attempts() >= self.max_attempts {
                    self.ledger.record(
                        ErrorKind::TransportFailure,
                        Severity::Fatal,
                        MODULE,
                        &format!("no connection after {} reconnect attempts", self.max_attempts),
                    );
                    return Err(e);
                }
            }
        }
        self.vitals.feed_transmit();
        Ok(())
    }

    fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            info!(reason = request.reason, "Reconnect requested");
            match self.transport.reconnect() {
                Ok(()) => self.backoff.on_success(),
                Err(e) => warn!(error = %e, "Requested reconnect failed"),
            }
        }
    }

    fn wait_for_batch(&self, shutdown: &AtomicBool) {
        let deadline = Instant::now() + WAIT_BUDGET;
        loop {
            if shutdown.load(Ordering::Acquire) {
                return;
            }
            match self.ring.available() {
                Ok(available) if available >= self.batch_min => return,
                Ok(_) => {}
                Err(_) => return,
            }
            if Instant::now() >= deadline {
                return;
            }
            std::thread::sleep(WAIT_POLL);
        }
    }

    /// Transport statistics passthrough.
    pub fn transport_stats(&self) -> crate::transport::TransportStats {
        self.transport.stats()
    }
}

fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::Acquire) {
            return;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        std::thread::sleep(left.min(Duration::from_millis(50)));
    }
}
