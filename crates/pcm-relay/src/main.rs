//! PCM Relay: 24/7 microphone-to-collector audio streaming daemon.

mod app;
mod config;
mod error;
mod fatal_store;
mod reboot;
#[cfg(test)]
mod tests;

pub(crate) use {
    app::App,
    error::{AppError, Result as AppResult},
};

use crate::config::Config;
use crate::reboot::ProcessReboot;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point.
fn main() {
    let log_dir = Config::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|_| PathBuf::from("."));
    let guard_slot = init_logging(&log_dir);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load config: {:?}", e);
            std::process::exit(1);
        }
    };

    // The reboot hook flushes the file log before the process exits; the
    // 3 s FATAL grace delay gives the non-blocking writer time to drain.
    let reboot = ProcessReboot::new();
    {
        let slot = Arc::clone(&guard_slot);
        reboot.on_reboot(move || {
            drop(slot.lock().take());
        });
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create tokio runtime: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(App::new(config).run(reboot)) {
        error!(error = ?e, "Relay error");
        drop(guard_slot.lock().take());
        std::process::exit(1);
    }

    drop(guard_slot.lock().take());
}

/// Console plus daily-rolling file output. The returned slot holds the file
/// writer's flush guard so the reboot hook can drain it.
fn init_logging(log_dir: &std::path::Path) -> Arc<Mutex<Option<WorkerGuard>>> {
    let appender = tracing_appender::rolling::daily(log_dir, "pcm-relay.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pcm_relay=debug,pcm_relay_core=debug")),
        )
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    Arc::new(Mutex::new(Some(guard)))
}
