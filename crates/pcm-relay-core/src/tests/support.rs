//! Shared doubles for the recovery-scenario tests: a scripted block reader,
//! a scripted transport, an in-memory fatal store and a recording reboot
//! hook.

use crate::capture::{BlockReader, CaptureStats};
use crate::ledger::{FatalRecord, FatalStore, RebootHook};
use crate::transport::{Transport, TransportStats};
use crate::{PipelineError, Result};

use std::collections::VecDeque;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use error_location::ErrorLocation;
use parking_lot::Mutex;

/// One scripted capture outcome.
pub(crate) enum ReadStep {
    /// A full block filled with the given value.
    Block(i32),
    /// A peripheral failure.
    Fail,
}

/// Replays a script of capture outcomes; past the end, blocks of zeros.
pub(crate) struct ScriptReader {
    steps: Mutex<VecDeque<ReadStep>>,
    /// Outcomes for successive reinit calls; past the end, success.
    reinit_failures: Mutex<VecDeque<bool>>,
    pub(crate) reinits: Arc<AtomicUsize>,
}

impl ScriptReader {
    pub(crate) fn new(steps: Vec<ReadStep>, reinit_failures: Vec<bool>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            reinit_failures: Mutex::new(reinit_failures.into()),
            reinits: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl BlockReader for ScriptReader {
    fn read_block(&mut self, out: &mut [i32]) -> Result<usize> {
        match self.steps.lock().pop_front() {
            Some(ReadStep::Block(value)) => {
                out.fill(value);
                Ok(out.len())
            }
            Some(ReadStep::Fail) => Err(PipelineError::CaptureFailure {
                reason: "scripted failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
            }),
            None => {
                out.fill(0);
                Ok(out.len())
            }
        }
    }

    fn reinit(&mut self) -> Result<()> {
        self.reinits.fetch_add(1, Ordering::Relaxed);
        let fails = self.reinit_failures.lock().pop_front().unwrap_or(false);
        if fails {
            Err(PipelineError::CaptureFailure {
                reason: "scripted reinit failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
        } else {
            Ok(())
        }
    }

    fn stats(&self) -> CaptureStats {
        CaptureStats::default()
    }
}

/// Replays a script of send/reconnect outcomes and records every payload
/// that went through.
pub(crate) struct ScriptTransport {
    /// `false` entries fail; past the end, success.
    send_failures: Mutex<VecDeque<bool>>,
    reconnect_failures: Mutex<VecDeque<bool>>,
    pub(crate) sent: Arc<Mutex<Vec<Vec<i32>>>>,
    pub(crate) reconnects: Arc<AtomicUsize>,
}

impl ScriptTransport {
    pub(crate) fn new(send_failures: Vec<bool>, reconnect_failures: Vec<bool>) -> Self {
        Self {
            send_failures: Mutex::new(send_failures.into()),
            reconnect_failures: Mutex::new(reconnect_failures.into()),
            sent: Arc::new(Mutex::new(Vec::new())),
            reconnects: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Transport for ScriptTransport {
    fn is_connected(&self) -> bool {
        true
    }

    fn send(&mut self, samples: &[i32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let fails = self.send_failures.lock().pop_front().unwrap_or(false);
        if fails {
            Err(PipelineError::TransportFailure {
                reason: "scripted send failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
        } else {
            self.sent.lock().push(samples.to_vec());
            Ok(())
        }
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        let fails = self.reconnect_failures.lock().pop_front().unwrap_or(false);
        if fails {
            Err(PipelineError::TransportFailure {
                reason: "scripted reconnect failure".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })
        } else {
            Ok(())
        }
    }

    fn close(&mut self) {}

    fn stats(&self) -> TransportStats {
        TransportStats {
            bytes_sent: 0,
            packets_sent: 0,
            lost_packets: 0,
            reconnects: self.reconnects.load(Ordering::Relaxed) as u32,
        }
    }
}

/// In-memory [`FatalStore`].
#[derive(Default)]
pub(crate) struct MemoryStore {
    last: Arc<Mutex<Option<FatalRecord>>>,
}

impl MemoryStore {
    pub(crate) fn new() -> (Box<dyn FatalStore>, Arc<Mutex<Option<FatalRecord>>>) {
        let store = Box::new(Self::default());
        let last = Arc::clone(&store.last);
        (store, last)
    }
}

impl FatalStore for MemoryStore {
    fn load_last_fatal(&self) -> Option<FatalRecord> {
        *self.last.lock()
    }

    fn store_last_fatal(&self, record: &FatalRecord) {
        *self.last.lock() = Some(*record);
    }
}

/// [`RebootHook`] that records instead of exiting.
#[derive(Default)]
pub(crate) struct RecordingHook {
    fired: Arc<AtomicBool>,
}

impl RecordingHook {
    pub(crate) fn new() -> (Box<dyn RebootHook>, Arc<AtomicBool>) {
        let hook = Box::new(Self::default());
        let fired = Arc::clone(&hook.fired);
        (hook, fired)
    }
}

impl RebootHook for RecordingHook {
    fn request_reboot(&self, _reason: &str) {
        self.fired.store(true, Ordering::Release);
    }
}
