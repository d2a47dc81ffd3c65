//! Liveness and overflow bookkeeping shared between the tasks and the
//! supervisor.
//!
//! Feed timestamps are monotonic milliseconds since pipeline start, updated
//! by each task on a healthy iteration; the supervisor declares a task dead
//! when its feed goes stale past the watchdog timeout.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Shared task feeds and ring-overflow accounting.
#[derive(Debug)]
pub struct Vitals {
    epoch: Instant,
    capture_feed_ms: AtomicU64,
    transmit_feed_ms: AtomicU64,
    ring_overflows: AtomicU32,
    last_overflow_ms: AtomicU64,
}

impl Vitals {
    /// Both feeds start "just fed" so the watchdog grace period begins at
    /// launch.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            capture_feed_ms: AtomicU64::new(0),
            transmit_feed_ms: AtomicU64::new(0),
            ring_overflows: AtomicU32::new(0),
            last_overflow_ms: AtomicU64::new(u64::MAX),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Capture task heartbeat.
    pub fn feed_capture(&self) {
        self.capture_feed_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Transmit task heartbeat.
    pub fn feed_transmit(&self) {
        self.transmit_feed_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Time since the capture task last fed.
    pub fn capture_age(&self) -> Duration {
        Duration::from_millis(
            self.now_ms()
                .saturating_sub(self.capture_feed_ms.load(Ordering::Acquire)),
        )
    }

    /// Time since the transmit task last fed.
    pub fn transmit_age(&self) -> Duration {
        Duration::from_millis(
            self.now_ms()
                .saturating_sub(self.transmit_feed_ms.load(Ordering::Acquire)),
        )
    }

    /// Counts one ring overflow episode and stamps it. Returns the running
    /// count.
    pub fn note_overflow(&self) -> u32 {
        self.last_overflow_ms.store(self.now_ms(), Ordering::Release);
        self.ring_overflows.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Overflow episodes since the last cooldown or emergency drain.
    pub fn overflow_count(&self) -> u32 {
        self.ring_overflows.load(Ordering::Relaxed)
    }

    /// Zeroes the overflow counter (cooldown elapsed or ring drained).
    pub fn clear_overflows(&self) {
        self.ring_overflows.store(0, Ordering::Relaxed);
    }

    /// Time since the last overflow, `None` before the first one.
    pub fn last_overflow_age(&self) -> Option<Duration> {
        let at = self.last_overflow_ms.load(Ordering::Acquire);
        if at == u64::MAX {
            None
        } else {
            Some(Duration::from_millis(self.now_ms().saturating_sub(at)))
        }
    }
}

impl Default for Vitals {
    fn default() -> Self {
        Self::new()
    }
}
