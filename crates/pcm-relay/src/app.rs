use crate::{AppResult, config::Config, fatal_store::TomlFatalStore, reboot::ProcessReboot};

use std::sync::Arc;
use std::time::Duration;

use pcm_relay_core::{
    AnyTransport, ErrorLedger, LinkMonitor, MicCapture, Pipeline, Severity,
};
use tracing::{error, info, instrument, warn};

const MODULE: &str = "main";
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(15);

/// The assembled daemon: configuration in, running pipeline out.
pub struct App {
    config: Config,
}

impl App {
    /// Wraps a loaded configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Builds the ledger, link and pipeline, runs until Ctrl-C, then shuts
    /// down in order.
    #[instrument(skip(self, reboot))]
    pub async fn run(self, reboot: ProcessReboot) -> AppResult<()> {
        info!("=== PCM Relay starting ===");

        let pipeline_config = self.config.to_pipeline()?;

        let data_dir = Config::data_dir()?;
        let store = TomlFatalStore::open(&data_dir)?;
        let ledger = ErrorLedger::new(
            pipeline_config.supervision.auto_reboot,
            Some(Box::new(store)),
            Box::new(reboot),
        );

        let link = match LinkMonitor::init(
            pipeline_config.link.clone(),
            pipeline_config.transport.endpoint,
            Arc::clone(&ledger),
        ) {
            Ok(link) => link,
            Err(e) => {
                ledger.record_error(Severity::Fatal, MODULE, &e);
                return Err(e.into());
            }
        };
        link.init_time_sync();

        let pipeline = match Pipeline::new(
            pipeline_config.clone(),
            Arc::clone(&ledger),
            Arc::clone(&link),
        ) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                // Init-time failure in the ring or config is fatal by
                // contract.
                ledger.record_error(Severity::Fatal, MODULE, &e);
                return Err(e.into());
            }
        };

        let capture_config = pipeline_config.capture.clone();
        let transport_config = pipeline_config.transport.clone();
        let width = capture_config.bit_width;
        let handles = pipeline.launch(
            move || MicCapture::open(capture_config),
            move |counters| AnyTransport::open(&transport_config, width, counters),
        )?;

        info!("=== PCM Relay running ===");

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Signal wait failed, shutting down");
        } else {
            info!("Shutdown requested");
        }

        let join = tokio::task::spawn_blocking(move || handles.shutdown());
        match tokio::time::timeout(SHUTDOWN_BUDGET, join).await {
            Ok(Ok(())) => info!("=== PCM Relay stopped ==="),
            Ok(Err(e)) => error!(error = ?e, "Shutdown task panicked"),
            Err(_) => warn!(
                "Shutdown did not complete within {} s, exiting anyway",
                SHUTDOWN_BUDGET.as_secs()
            ),
        }

        Ok(())
    }
}
