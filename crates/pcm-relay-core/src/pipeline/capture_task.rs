//! The capture task: pulls blocks from the driver and feeds the ring.
//!
//! Runs at the highest priority on its own core. Nothing in the loop may
//! stall longer than one block read; logging is rate-limited so a slow
//! console can never back up into the capture path.

use crate::capture::BlockReader;
use crate::config::SupervisionConfig;
use crate::ledger::ErrorLedger;
use crate::pipeline::Vitals;
use crate::ring::SampleRing;
use crate::{ErrorKind, PipelineError, Result, Severity};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

const MODULE: &str = "capture";
/// Emit one buffer-usage line every this many healthy iterations.
const LOG_EVERY: u32 = 100;
const FAILURE_PAUSE: Duration = Duration::from_millis(10);
const REINIT_PAUSE: Duration = Duration::from_secs(1);

/// Per-iteration state machine of the capture loop.
pub struct CaptureTask<R: BlockReader> {
    reader: R,
    ring: Arc<SampleRing>,
    vitals: Arc<Vitals>,
    ledger: Arc<ErrorLedger>,
    max_failures: u32,
    max_overflows: u32,
    block: Vec<i32>,
    consecutive_failures: u32,
    log_counter: u32,
}

impl<R: BlockReader> CaptureTask<R> {
    /// Builds the task around an already-initialized driver. The block
    /// scratch is the only allocation and happens here, once.
    pub fn new(
        reader: R,
        block_samples: usize,
        ring: Arc<SampleRing>,
        vitals: Arc<Vitals>,
        ledger: Arc<ErrorLedger>,
        supervision: &SupervisionConfig,
    ) -> Self {
        Self {
            reader,
            ring,
            vitals,
            ledger,
            max_failures: supervision.max_capture_failures,
            max_overflows: supervision.max_ring_overflows,
            block: vec![0i32; block_samples],
            consecutive_failures: 0,
            log_counter: 0,
        }
    }

    /// Runs until `shutdown` or a fatal condition.
    pub fn run(mut self, shutdown: &AtomicBool) {
        info!("Capture task started");
        while !shutdown.load(Ordering::Acquire) {
            if self.poll_once().is_err() {
                error!("Capture task stopping on fatal condition");
                break;
            }
        }
        info!("Capture task stopped");
    }

    /// One loop iteration. `Err` means a fatal condition was recorded and
    /// the task must stop.
    pub fn poll_once(&mut self) -> Result<()> {
        match self.reader.read_block(&mut self.block) {
            Ok(got) => {
                self.consecutive_failures = 0;
                self.vitals.feed_capture();
                self.enqueue(got)?;

                self.log_counter += 1;
                if self.log_counter >= LOG_EVERY {
                    self.log_counter = 0;
                    if let Ok(usage) = self.ring.usage_percent() {
                        info!(usage_percent = usage, "Buffer usage");
                    }
                }
                Ok(())
            }
            Err(e) => self.recover(e),
        }
    }

    fn enqueue(&mut self, got: usize) -> Result<()> {
        let accepted = match self.ring.write(&self.block[..got]) {
            Ok(n) => n,
            Err(e) => {
                // Lock deadline expired: suspected deadlock, nothing left
                // to salvage from this side.
                self.ledger.record_error(Severity::Fatal, MODULE, &e);
                return Err(e);
            }
        };

        if accepted < got {
            let dropped = got - accepted;
            let overflows = self.vitals.note_overflow();
            warn!(dropped, overflows, "Ring buffer full, dropped samples");
            self.ledger.record(
                ErrorKind::BufferOverflow,
                Severity::Warning,
                MODULE,
                &format!("dropped {} samples", dropped),
            );

            if overflows > self.max_overflows {
                warn!(overflows, "Too many overflows, forcing buffer drain");
                self.ring.reset().map_err(|e| {
                    self.ledger.record_error(Severity::Fatal, MODULE, &e);
                    e
                })?;
                self.vitals.clear_overflows();
            }
        }
        Ok(())
    }

    fn recover(&mut self, e: PipelineError) -> Result<()> {
        self.consecutive_failures += 1;
        error!(
            consecutive = self.consecutive_failures,
            error = %e,
            "Capture read failed"
        );

        if self.consecutive_failures >= self.max_failures {
            warn!(
                failures = self.consecutive_failures,
                "Too many capture failures, reinitializing driver"
            );
            std::thread::sleep(REINIT_PAUSE);
            match self.reader.reinit() {
                Ok(()) => {
                    info!("Capture driver reinitialized");
                    self.consecutive_failures = 0;
                }
                Err(reinit_err) => {
                    self.ledger.record(
                        ErrorKind::CaptureFailure,
                        Severity::Fatal,
                        MODULE,
                        &format!("driver reinit failed: {}", reinit_err),
                    );
                    return Err(reinit_err);
                }
            }
        } else {
            std::thread::sleep(FAILURE_PAUSE);
        }
        Ok(())
    }

    /// Driver statistics passthrough, for the supervisor roll-up.
    pub fn reader_stats(&self) -> crate::capture::CaptureStats {
        self.reader.stats()
    }
}
