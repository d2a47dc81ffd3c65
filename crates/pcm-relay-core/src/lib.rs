//! PCM Relay Core Library
//!
//! The real-time capture-to-network pipeline: a microphone block source, a
//! bounded sample ring with backpressure, reliable and datagram stream
//! transports with reconnect/backoff, and the supervisor that keeps the
//! whole thing alive 24/7 on a small fixed memory budget.
//!
//! # Example
//!
//! ```no_run
//! use pcm_relay_core::config::PipelineConfig;
//! use pcm_relay_core::{
//!     AnyTransport, ErrorLedger, LinkMonitor, MicCapture, Pipeline, Result,
//! };
//!
//! fn main() -> Result<()> {
//!     let config = PipelineConfig::default();
//!     let ledger = ErrorLedger::new(false, None, Box::new(NoReboot));
//!     let link = LinkMonitor::init(
//!         config.link.clone(),
//!         config.transport.endpoint,
//!         ledger.clone(),
//!     )?;
//!
//!     let capture = config.capture.clone();
//!     let transport = config.transport.clone();
//!     let width = capture.bit_width;
//!
//!     let handles = Pipeline::new(config, ledger, link)?.launch(
//!         move || MicCapture::open(capture),
//!         move |counters| AnyTransport::open(&transport, width, counters),
//!     )?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     handles.shutdown();
//!     Ok(())
//! }
//!
//! struct NoReboot;
//! impl pcm_relay_core::RebootHook for NoReboot {
//!     fn request_reboot(&self, _reason: &str) {}
//! }
//! ```

pub mod config;

mod capture;
mod error;
mod ledger;
mod link;
mod pipeline;
mod ring;
mod rt;
mod supervisor;
mod transport;

pub use {
    capture::{BlockReader, CaptureStats, MicCapture, SineReader, slot_from_f32},
    error::{ErrorKind, PipelineError, Result, Severity},
    ledger::{ErrorLedger, FatalRecord, FatalStore, REBOOT_DELAY, RebootHook},
    link::{LinkMonitor, LinkState, WallClock},
    pipeline::{
        Backoff, CaptureTask, Pipeline, PipelineHandles, ReconnectRequest, TransmitTask, Vitals,
    },
    ring::{LOCK_DEADLINE, SampleRing},
    supervisor::Supervisor,
    transport::{
        AnyTransport, DATAGRAM_HEADER_LEN, MAX_DATAGRAM_LEN, TcpTransport, Transport,
        TransportCounters, TransportStats, UdpTransport, pack_append, packed_len,
    },
};

#[cfg(test)]
mod tests;
