//! Microphone capture through the host audio stack.
//!
//! The device callback must never allocate or block: it converts incoming
//! frames to 32-bit slots and pushes them into a lock-free ring sized like
//! the peripheral's DMA chain (`ring_descriptors` × `block_samples`). If the
//! reader falls behind, frames are dropped and counted — capture loss over
//! capture latency. [`MicCapture::read_block`] drains the ring on the
//! capture thread with the configured block deadline.

use crate::capture::{BlockReader, CaptureCounters, CaptureStats, slot_from_f32};
use crate::config::CaptureConfig;
use crate::{PipelineError, Result};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use error_location::ErrorLocation;
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{error, info, instrument, warn};

const DRAIN_POLL: Duration = Duration::from_millis(1);

/// Live microphone driver. Not `Send`: construct and use it on the capture
/// thread.
pub struct MicCapture {
    config: CaptureConfig,
    stream: Option<Stream>,
    frames: Option<Consumer<i32>>,
    counters: Arc<CaptureCounters>,
    /// Set by the device error callback; the next read fails.
    stream_failed: Arc<AtomicBool>,
}

impl MicCapture {
    /// Opens the default input device and starts continuous capture.
    ///
    /// # Errors
    ///
    /// `InitFailed` when no input device exists or the stream cannot be
    /// built and started.
    #[track_caller]
    #[instrument(skip(config), fields(sample_rate = config.sample_rate))]
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let mut capture = Self {
            config,
            stream: None,
            frames: None,
            counters: Arc::new(CaptureCounters::default()),
            stream_failed: Arc::new(AtomicBool::new(false)),
        };
        capture.start().map_err(|e| PipelineError::InitFailed {
            what: format!("capture driver: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;
        Ok(capture)
    }

    fn start(&mut self) -> Result<()> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| PipelineError::CaptureFailure {
                reason: "no input device available".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let native = device
            .default_input_config()
            .map_err(|e| PipelineError::CaptureFailure {
                reason: format!("input config: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })?;
        let sample_format = native.sample_format();
        let native_channels = native.channels();

        let stream_config = StreamConfig {
            channels: native_channels,
            sample_rate: self.config.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = self.config.ring_descriptors * self.config.block_samples;
        let (producer, consumer) = RingBuffer::<i32>::new(capacity);

        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&device, &stream_config, producer),
            SampleFormat::I16 => self.build_stream::<i16>(&device, &stream_config, producer),
            SampleFormat::U16 => self.build_stream::<u16>(&device, &stream_config, producer),
            other => Err(PipelineError::CaptureFailure {
                reason: format!("unsupported sample format {:?}", other),
                location: ErrorLocation::from(Location::caller()),
            }),
        }?;

        stream.play().map_err(|e| PipelineError::CaptureFailure {
            reason: format!("stream start: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(
            sample_rate = self.config.sample_rate,
            bits = self.config.bit_width.bits(),
            channels = self.config.channels,
            bclk = self.config.pins.bclk,
            ws = self.config.pins.ws,
            din = self.config.pins.din,
            descriptors = self.config.ring_descriptors,
            frames_per_descriptor = self.config.block_samples,
            "Capture started"
        );

        self.stream_failed.store(false, Ordering::Release);
        self.stream = Some(stream);
        self.frames = Some(consumer);
        Ok(())
    }

    /// Left slot only, no allocation, never blocks: convert and push, drop
    /// the rest of the callback when the ring is full.
    fn build_stream<T>(
        &self,
        device: &Device,
        config: &StreamConfig,
        mut producer: Producer<i32>,
    ) -> Result<Stream>
    where
        T: cpal::SizedSample,
        f32: cpal::FromSample<T>,
    {
        let width = self.config.bit_width;
        let channels = config.channels.max(1) as usize;
        let counters = Arc::clone(&self.counters);
        let failed = Arc::clone(&self.stream_failed);

        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mut dropped = 0u64;
                    for frame in data.chunks(channels) {
                        let value = <f32 as cpal::FromSample<T>>::from_sample_(frame[0]);
                        if producer.push(slot_from_f32(value, width)).is_err() {
                            dropped += 1;
                        }
                    }
                    if dropped > 0 {
                        counters.overflows.fetch_add(dropped, Ordering::Relaxed);
                    }
                },
                move |err| {
                    error!(error = %err, "Capture stream error");
                    failed.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| PipelineError::CaptureFailure {
                reason: format!("stream build: {}", e),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    fn stop(&mut self) {
        self.frames = None;
        if self.stream.take().is_some() {
            info!("Capture stopped");
        }
    }
}

impl BlockReader for MicCapture {
    #[track_caller]
    fn read_block(&mut self, out: &mut [i32]) -> Result<usize> {
        let deadline = Instant::now() + self.config.read_timeout;
        let mut filled = 0;

        loop {
            if self.stream_failed.load(Ordering::Acquire) {
                return Err(PipelineError::CaptureFailure {
                    reason: "device stream reported an error".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if let Some(frames) = self.frames.as_mut() {
                while filled < out.len() {
                    match frames.pop() {
                        Ok(slot) => {
                            out[filled] = slot;
                            filled += 1;
                        }
                        Err(_) => break,
                    }
                }
            } else {
                return Err(PipelineError::CaptureFailure {
                    reason: "driver not initialized".to_string(),
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            if filled == out.len() {
                return Ok(filled);
            }

            if Instant::now() >= deadline {
                if filled == 0 {
                    return Err(PipelineError::CaptureFailure {
                        reason: format!(
                            "no samples within {} ms",
                            self.config.read_timeout.as_millis()
                        ),
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                self.counters.underflows.fetch_add(1, Ordering::Relaxed);
                warn!(requested = out.len(), got = filled, "Capture underflow");
                return Ok(filled);
            }

            std::thread::sleep(DRAIN_POLL);
        }
    }

    fn reinit(&mut self) -> Result<()> {
        self.stop();
        self.start()
    }

    fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }
}
