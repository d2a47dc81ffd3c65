//! Best-effort realtime scheduling helpers.
//!
//! The capture loop wants a fixed high priority and a dedicated core; the
//! transmit and supervisor loops sit below it next to the network stack.
//! Neither promotion nor pinning is load-bearing for correctness, so every
//! failure degrades to a warning and the default scheduler.

use tracing::{debug, warn};

/// Requests `SCHED_FIFO` at `priority` (1-99) for the calling thread.
#[cfg(unix)]
pub fn promote_to_realtime(priority: u8) {
    let param = libc::sched_param {
        sched_priority: i32::from(priority.clamp(1, 99)),
    };
    // SAFETY: plain syscall on the calling thread with a valid param struct.
    let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if rc == 0 {
        debug!(priority, "Realtime priority set");
    } else {
        warn!(
            priority,
            errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0),
            "Realtime priority unavailable, staying on the default scheduler"
        );
    }
}

/// No realtime promotion outside Unix.
#[cfg(not(unix))]
pub fn promote_to_realtime(priority: u8) {
    debug!(priority, "Realtime priority not supported on this platform");
}

/// Pins the calling thread to `core`.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core: usize) {
    // SAFETY: cpu_set_t is plain data; the macros only touch the local set.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        let rc = libc::sched_setaffinity(0, size_of::<libc::cpu_set_t>(), &set);
        if rc == 0 {
            debug!(core, "Thread pinned");
        } else {
            warn!(core, "Thread pinning failed, staying unpinned");
        }
    }
}

/// No pinning outside Linux.
#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(core: usize) {
    debug!(core, "Thread pinning not supported on this platform");
}
