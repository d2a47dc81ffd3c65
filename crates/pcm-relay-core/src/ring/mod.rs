//! Bounded producer/consumer sample queue between the capture and transmit
//! tasks.
//!
//! One writer (capture task) and one reader (transmit task). Neither side
//! ever blocks on the other: a write that does not fit drops the excess and
//! sets a sticky overflow flag, a read returns whatever is available. The
//! critical sections are two bulk copies, so lock hold times are bounded by
//! a single block/batch memcpy; the lock itself carries a deadline and an
//! expired deadline is reported as [`PipelineError::Timeout`], which the
//! callers escalate as a suspected deadlock.

use crate::{PipelineError, Result};

use std::panic::Location;
use std::time::Duration;

use error_location::ErrorLocation;
use parking_lot::Mutex;
use tracing::{info, warn};

/// How long any ring operation may wait for the lock before the condition is
/// treated as a deadlock.
pub const LOCK_DEADLINE: Duration = Duration::from_secs(5);

/// Fixed-capacity FIFO of raw 32-bit capture slots.
///
/// Created once at startup with a capacity taken from configuration, shared
/// between exactly one producer and one consumer, dropped only at shutdown.
pub struct SampleRing {
    state: Mutex<RingState>,
    capacity: usize,
    lock_deadline: Duration,
}

struct RingState {
    data: Box<[i32]>,
    read: usize,
    write: usize,
    available: usize,
    overflow: bool,
}

impl SampleRing {
    /// Allocates a ring holding `capacity_bytes / 4` samples.
    ///
    /// The backing storage is reserved up front and never reallocated.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the capacity is smaller than one sample,
    /// `OutOfMemory` if the reservation fails.
    #[track_caller]
    pub fn with_capacity_bytes(capacity_bytes: usize) -> Result<Self> {
        let capacity = capacity_bytes / size_of::<i32>();
        if capacity == 0 {
            return Err(PipelineError::InvalidConfig {
                reason: format!("ring capacity {} bytes is below one sample", capacity_bytes),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PipelineError::OutOfMemory {
                what: format!("{} byte ring buffer", capacity_bytes),
                location: ErrorLocation::from(Location::caller()),
            })?;
        data.resize(capacity, 0i32);

        info!(
            capacity_samples = capacity,
            capacity_kib = capacity_bytes / 1024,
            "Ring buffer allocated"
        );

        Ok(Self {
            state: Mutex::new(RingState {
                data: data.into_boxed_slice(),
                read: 0,
                write: 0,
                available: 0,
                overflow: false,
            }),
            capacity,
            lock_deadline: LOCK_DEADLINE,
        })
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `samples`, dropping whatever does not fit.
    ///
    /// Returns the number of samples accepted. A short or zero acceptance
    /// sets the sticky overflow flag; the producer is never stalled.
    #[track_caller]
    pub fn write(&self, samples: &[i32]) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock("write")?;

        let free = self.capacity - state.available;
        let accepted = samples.len().min(free);
        if accepted < samples.len() {
            state.overflow = true;
        }
        if accepted == 0 {
            return Ok(0);
        }

        // At most two contiguous segments: up to the end of storage, then
        // wrapped to the start.
        let write = state.write;
        let first = accepted.min(self.capacity - write);
        state.data[write..write + first].copy_from_slice(&samples[..first]);
        let second = accepted - first;
        if second > 0 {
            state.data[..second].copy_from_slice(&samples[first..accepted]);
        }

        state.write = wrap(write + accepted, self.capacity);
        state.available += accepted;

        Ok(accepted)
    }

    /// Fills `out` from the front of the queue.
    ///
    /// Returns the number of samples copied, which is less than `out.len()`
    /// when fewer are buffered. Never waits for the producer.
    #[track_caller]
    pub fn read(&self, out: &mut [i32]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let mut state = self.lock("read")?;

        let taken = out.len().min(state.available);
        if taken == 0 {
            return Ok(0);
        }

        let read = state.read;
        let first = taken.min(self.capacity - read);
        out[..first].copy_from_slice(&state.data[read..read + first]);
        let second = taken - first;
        if second > 0 {
            out[first..taken].copy_from_slice(&state.data[..second]);
        }

        state.read = wrap(read + taken, self.capacity);
        state.available -= taken;

        Ok(taken)
    }

    /// Number of buffered samples.
    #[track_caller]
    pub fn available(&self) -> Result<usize> {
        Ok(self.lock("available")?.available)
    }

    /// Number of samples that can be written without dropping.
    #[track_caller]
    pub fn free_space(&self) -> Result<usize> {
        Ok(self.capacity - self.lock("free_space")?.available)
    }

    /// Fill level as a percentage, rounded down.
    #[track_caller]
    pub fn usage_percent(&self) -> Result<u8> {
        let available = self.lock("usage_percent")?.available;
        Ok((available * 100 / self.capacity) as u8)
    }

    /// Reads and clears the sticky overflow flag.
    ///
    /// Returns `true` exactly once per overflow episode: once cleared, it
    /// stays `false` until the next dropped write.
    #[track_caller]
    pub fn check_overflow_and_clear(&self) -> Result<bool> {
        let mut state = self.lock("check_overflow_and_clear")?;
        let overflow = state.overflow;
        state.overflow = false;
        Ok(overflow)
    }

    /// Emergency drain: discards all buffered samples and clears the
    /// overflow flag. Invoked by the capture task on sustained overflow.
    #[track_caller]
    pub fn reset(&self) -> Result<()> {
        let mut state = self.lock("reset")?;
        state.read = 0;
        state.write = 0;
        state.available = 0;
        state.overflow = false;
        drop(state);
        warn!("Ring buffer drained");
        Ok(())
    }

    #[track_caller]
    fn lock(&self, op: &str) -> Result<parking_lot::MutexGuard<'_, RingState>> {
        self.state
            .try_lock_for(self.lock_deadline)
            .ok_or_else(|| PipelineError::Timeout {
                what: format!("ring buffer lock in {}", op),
                location: ErrorLocation::from(Location::caller()),
            })
    }
}

// `n` is always < 2 * capacity, so a conditional subtract is enough.
fn wrap(n: usize, capacity: usize) -> usize {
    if n >= capacity { n - capacity } else { n }
}
