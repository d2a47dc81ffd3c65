//! Severity-tagged error accounting and the FATAL escalation path.
//!
//! Every module reports failures here. Counters are in-memory atomics; a
//! record at `Critical` or above is written through to the persistent store,
//! and a `Fatal` record additionally triggers the reboot hook after a short
//! grace delay so the tail of the log stream gets flushed.

use crate::{ErrorKind, PipelineError, Severity};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{error, info, warn};

/// Delay between a FATAL record and the reboot request.
pub const REBOOT_DELAY: Duration = Duration::from_secs(3);

/// The last-fatal record persisted across reboots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalRecord {
    /// Which error kind was fatal.
    pub kind: ErrorKind,
    /// How many times that kind had occurred this boot.
    pub count: u32,
}

/// Write-through persistence for the last-fatal record. Implemented by the
/// configuration layer; the pipeline only reads it at startup and writes it
/// on `Critical`/`Fatal`.
pub trait FatalStore: Send + Sync {
    /// The record left by the previous boot, if any.
    fn load_last_fatal(&self) -> Option<FatalRecord>;

    /// Persists `record`, replacing the previous one. Failures are the
    /// store's to log; the escalation path does not depend on them.
    fn store_last_fatal(&self, record: &FatalRecord);
}

/// The "reboot now" entry point the pipeline invokes on FATAL conditions.
/// The production implementation runs pre-reboot cleanup and exits the
/// process; tests substitute a recording hook.
pub trait RebootHook: Send + Sync {
    /// Requests an immediate restart. May return in tests; production
    /// implementations do not.
    fn request_reboot(&self, reason: &str);
}

/// Severity-ordered counters plus the escalation wiring.
pub struct ErrorLedger {
    counters: [AtomicU32; ErrorKind::COUNT],
    auto_reboot: bool,
    store: Option<Box<dyn FatalStore>>,
    reboot: Box<dyn RebootHook>,
    reboot_delay: Duration,
}

impl ErrorLedger {
    /// Wires the ledger to its persistence and escalation collaborators.
    /// `store` is `None` when the configuration layer provides no
    /// persistence (counters still work, nothing survives reboot).
    pub fn new(
        auto_reboot: bool,
        store: Option<Box<dyn FatalStore>>,
        reboot: Box<dyn RebootHook>,
    ) -> Arc<Self> {
        Self::with_delay(auto_reboot, store, reboot, REBOOT_DELAY)
    }

    /// As [`ErrorLedger::new`] but without the grace delay, for tests.
    pub fn new_immediate(
        auto_reboot: bool,
        store: Option<Box<dyn FatalStore>>,
        reboot: Box<dyn RebootHook>,
    ) -> Arc<Self> {
        Self::with_delay(auto_reboot, store, reboot, Duration::ZERO)
    }

    fn with_delay(
        auto_reboot: bool,
        store: Option<Box<dyn FatalStore>>,
        reboot: Box<dyn RebootHook>,
        reboot_delay: Duration,
    ) -> Arc<Self> {
        let ledger = Arc::new(Self {
            counters: Default::default(),
            auto_reboot,
            store,
            reboot,
            reboot_delay,
        });
        if let Some(previous) = ledger.last_fatal() {
            warn!(
                kind = previous.kind.name(),
                count = previous.count,
                "Previous boot ended fatally"
            );
        }
        ledger
    }

    /// Counts and logs one error occurrence; persists and escalates
    /// according to `severity`.
    pub fn record(&self, kind: ErrorKind, severity: Severity, module: &str, message: &str) {
        let count = self.counters[kind.index()].fetch_add(1, Ordering::Relaxed) + 1;

        match severity {
            Severity::Info => {
                info!(module, kind = kind.name(), count, "{}", message);
            }
            Severity::Warning => {
                warn!(module, kind = kind.name(), count, "{}", message);
            }
            Severity::Error => {
                error!(module, kind = kind.name(), count, "{}", message);
            }
            Severity::Critical | Severity::Fatal => {
                error!(
                    module,
                    kind = kind.name(),
                    severity = severity.name(),
                    count,
                    "{}",
                    message
                );
                if let Some(store) = &self.store {
                    store.store_last_fatal(&FatalRecord { kind, count });
                }
                if severity == Severity::Fatal {
                    self.escalate(kind, module, message);
                }
            }
        }
    }

    /// Maps a [`PipelineError`] onto its counter and records it.
    pub fn record_error(&self, severity: Severity, module: &str, err: &PipelineError) {
        self.record(err.kind(), severity, module, &err.to_string());
    }

    /// Occurrences of `kind` since startup.
    pub fn count(&self, kind: ErrorKind) -> u32 {
        self.counters[kind.index()].load(Ordering::Relaxed)
    }

    /// The persisted record from the previous boot, if any.
    pub fn last_fatal(&self) -> Option<FatalRecord> {
        self.store.as_ref().and_then(|s| s.load_last_fatal())
    }

    /// Whether FATAL records restart the process.
    pub fn auto_reboot(&self) -> bool {
        self.auto_reboot
    }

    fn escalate(&self, kind: ErrorKind, module: &str, message: &str) {
        error!(
            module,
            kind = kind.name(),
            "FATAL: {} -- restarting in {} s",
            message,
            self.reboot_delay.as_secs()
        );
        if !self.auto_reboot {
            warn!("Auto-reboot disabled, continuing degraded");
            return;
        }
        std::thread::sleep(self.reboot_delay);
        self.reboot.request_reboot(message);
    }
}
