//! The owned pipeline value and its task threads.
//!
//! [`Pipeline`] holds every shared sub-resource (ring, vitals, ledger, link,
//! transport counters) and hands each task exactly the references it needs.
//! Readers and transports are created on their task's own thread through
//! factories: the device stream is not `Send`, and a slow initial connect
//! must not stall the other tasks.

mod backoff;
mod capture_task;
mod transmit_task;
mod vitals;

pub use backoff::Backoff;
pub use capture_task::CaptureTask;
pub use transmit_task::{ReconnectRequest, TransmitTask};
pub use vitals::Vitals;

use crate::capture::BlockReader;
use crate::config::PipelineConfig;
use crate::ledger::ErrorLedger;
use crate::link::LinkMonitor;
use crate::ring::SampleRing;
use crate::supervisor::Supervisor;
use crate::transport::{Transport, TransportCounters, TransportStats};
use crate::{PipelineError, Result, Severity, rt};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::thread::JoinHandle;

use error_location::ErrorLocation;
use tracing::{error, info};

/// Depth of the supervisor→transmit reconnect-request channel. Requests
/// beyond this are dropped, not queued: a stale pile of reconnects is worse
/// than none.
const RECONNECT_QUEUE: usize = 4;

/// The assembled capture-to-network pipeline, ready to launch.
pub struct Pipeline {
    config: PipelineConfig,
    ring: Arc<SampleRing>,
    vitals: Arc<Vitals>,
    ledger: Arc<ErrorLedger>,
    link: Arc<LinkMonitor>,
    counters: Arc<TransportCounters>,
}

impl Pipeline {
    /// Validates the snapshot and allocates the ring. Init-time failure
    /// here is fatal by contract; the caller records and reboots.
    #[track_caller]
    pub fn new(
        config: PipelineConfig,
        ledger: Arc<ErrorLedger>,
        link: Arc<LinkMonitor>,
    ) -> Result<Self> {
        config.validate()?;
        let ring = Arc::new(SampleRing::with_capacity_bytes(config.ring_bytes)?);

        Ok(Self {
            config,
            ring,
            vitals: Arc::new(Vitals::new()),
            ledger,
            link,
            counters: TransportCounters::new(),
        })
    }

    /// The shared sample queue.
    pub fn ring(&self) -> Arc<SampleRing> {
        Arc::clone(&self.ring)
    }

    /// The shared liveness/overflow cell.
    pub fn vitals(&self) -> Arc<Vitals> {
        Arc::clone(&self.vitals)
    }

    /// The shared transport counters.
    pub fn counters(&self) -> Arc<TransportCounters> {
        Arc::clone(&self.counters)
    }

    /// Spawns the capture, transmit and supervisor threads.
    ///
    /// `make_reader` runs on the capture thread, `make_transport` on the
    /// transmit thread. A factory failure is recorded as FATAL through the
    /// ledger; the other tasks keep running until the ledger's escalation
    /// decides otherwise.
    ///
    /// # Errors
    ///
    /// `InitFailed` when a thread cannot be spawned.
    #[track_caller]
    pub fn launch<R, FR, T, FT>(self, make_reader: FR, make_transport: FT) -> Result<PipelineHandles>
    where
        R: BlockReader + 'static,
        FR: FnOnce() -> Result<R> + Send + 'static,
        T: Transport + 'static,
        FT: FnOnce(Arc<TransportCounters>) -> Result<T> + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (reconnect_tx, reconnect_rx) = mpsc::sync_channel::<ReconnectRequest>(RECONNECT_QUEUE);

        let capture = {
            let shutdown = Arc::clone(&shutdown);
            let ring = Arc::clone(&self.ring);
            let vitals = Arc::clone(&self.vitals);
            let ledger = Arc::clone(&self.ledger);
            let supervision = self.config.supervision.clone();
            let block_samples = self.config.capture.block_samples;
            spawn_thread("capture", move || {
                if let Some(priority) = supervision.capture_priority {
                    rt::promote_to_realtime(priority);
                }
                if let Some(core) = supervision.capture_core {
                    rt::pin_to_core(core);
                }
                match make_reader() {
                    Ok(reader) => {
                        CaptureTask::new(reader, block_samples, ring, vitals, ledger, &supervision)
                            .run(&shutdown);
                    }
                    Err(e) => {
                        error!(error = %e, "Capture driver init failed");
                        ledger.record_error(Severity::Fatal, "capture", &e);
                    }
                }
            })?
        };

        let transmit = {
            let shutdown = Arc::clone(&shutdown);
            let ring = Arc::clone(&self.ring);
            let vitals = Arc::clone(&self.vitals);
            let ledger = Arc::clone(&self.ledger);
            let counters = Arc::clone(&self.counters);
            let supervision = self.config.supervision.clone();
            let batch_samples = self.config.transport.batch_samples;
            spawn_thread("transmit", move || {
                if let Some(priority) = supervision.transmit_priority {
                    rt::promote_to_realtime(priority);
                }
                if let Some(core) = supervision.transmit_core {
                    rt::pin_to_core(core);
                }
                match make_transport(counters) {
                    Ok(transport) => {
                        TransmitTask::new(
                            transport,
                            batch_samples,
                            ring,
                            vitals,
                            ledger,
                            reconnect_rx,
                            &supervision,
                        )
                        .run(&shutdown, supervision.startup_delay);
                    }
                    Err(e) => {
                        error!(error = %e, "Transport init failed");
                        ledger.record_error(Severity::Fatal, "transmit", &e);
                    }
                }
            })?
        };

        let supervisor = {
            let shutdown = Arc::clone(&shutdown);
            let mut supervisor = Supervisor::new(
                Arc::clone(&self.link),
                Arc::clone(&self.vitals),
                Arc::clone(&self.counters),
                Arc::clone(&self.ledger),
                Arc::clone(&self.ring),
                reconnect_tx.clone(),
                self.config.supervision.clone(),
                self.config.link.ntp_resync_interval,
            );
            let core = self.config.supervision.transmit_core;
            spawn_thread("supervisor", move || {
                if let Some(core) = core {
                    rt::pin_to_core(core);
                }
                supervisor.run(&shutdown);
            })?
        };

        info!("Pipeline launched");

        Ok(PipelineHandles {
            shutdown,
            reconnect_tx,
            link: self.link,
            vitals: self.vitals,
            counters: self.counters,
            ring: self.ring,
            threads: vec![capture, transmit, supervisor],
        })
    }
}

/// Live handles to the launched pipeline.
pub struct PipelineHandles {
    shutdown: Arc<AtomicBool>,
    reconnect_tx: SyncSender<ReconnectRequest>,
    link: Arc<LinkMonitor>,
    vitals: Arc<Vitals>,
    counters: Arc<TransportCounters>,
    ring: Arc<SampleRing>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineHandles {
    /// Signals every task to stop and joins them, then stops the link
    /// monitor.
    pub fn shutdown(mut self) {
        info!("Pipeline shutting down");
        self.shutdown.store(true, Ordering::Release);
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
        self.link.deinit();
        info!("Pipeline stopped");
    }

    /// Requests a transport reconnect from outside the transmit task.
    pub fn request_reconnect(&self, reason: &'static str) {
        let _ = self.reconnect_tx.try_send(ReconnectRequest { reason });
    }

    /// Current transport statistics.
    pub fn transport_stats(&self) -> TransportStats {
        self.counters.snapshot()
    }

    /// The shared liveness/overflow cell.
    pub fn vitals(&self) -> Arc<Vitals> {
        Arc::clone(&self.vitals)
    }

    /// The shared sample queue.
    pub fn ring(&self) -> Arc<SampleRing> {
        Arc::clone(&self.ring)
    }
}

fn spawn_thread(
    name: &str,
    body: impl FnOnce() + Send + 'static,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
        .map_err(|e| PipelineError::InitFailed {
            what: format!("{} thread: {}", name, e),
            location: ErrorLocation::from(Location::caller()),
        })
}
