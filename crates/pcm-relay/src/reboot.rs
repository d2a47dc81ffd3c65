//! The process-level "reboot now" hook.
//!
//! On the device a fatal condition resets the chip; here it exits the
//! process with a distinct status so the service manager restarts it.
//! Collaborators register cleanup closures (flush logs, close sockets) that
//! run before the exit.

use pcm_relay_core::RebootHook;

use parking_lot::Mutex;
use tracing::error;

/// Exit status for a supervised restart (EX_SOFTWARE).
pub const REBOOT_EXIT_CODE: i32 = 70;

type Cleanup = Box<dyn FnOnce() + Send>;

/// [`RebootHook`] that runs registered cleanup and exits the process.
#[derive(Default)]
pub struct ProcessReboot {
    cleanups: Mutex<Vec<Cleanup>>,
}

impl ProcessReboot {
    /// A hook with no cleanup registered yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a closure to run right before the exit.
    pub fn on_reboot(&self, cleanup: impl FnOnce() + Send + 'static) {
        self.cleanups.lock().push(Box::new(cleanup));
    }
}

impl RebootHook for ProcessReboot {
    fn request_reboot(&self, reason: &str) {
        error!(reason, "========================================");
        error!(reason, "FATAL: restarting now");
        error!(reason, "========================================");
        for cleanup in self.cleanups.lock().drain(..) {
            cleanup();
        }
        std::process::exit(REBOOT_EXIT_CODE);
    }
}
