//! Audio output sink using cpal
//!
//! One [`CpalSink`] is one live connection to the system's output device. A
//! dedicated thread owns the `cpal::Stream` (streams are not `Send`); the
//! writer side holds the producer half of a lock-free ring buffer and the
//! device callback drains the consumer half, zero-filling on underrun.
//!
//! `write` respects backpressure: when the ring is full it sleeps and retries
//! rather than dropping samples, so a slow device slows the upstream decode.
//! `close` is idempotent. A writer stuck in the retry loop is unblocked
//! through [`OutputSink::close_signal`]: the retry loop checks the `closed`
//! flag, which the slot can set without taking the sink lock the writer is
//! holding.

use crate::audio::types::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use crate::audio::{OutputSink, SinkFactory};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat as CpalSampleFormat, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long the writer sleeps when the ring buffer is full
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(5);

/// Poll interval of the stream thread waiting for close
const CLOSE_POLL: Duration = Duration::from_millis(50);

/// Factory producing cpal-backed sinks for the configured device
pub struct CpalSinkFactory {
    device: Option<String>,
    buffer_frames: usize,
}

impl CpalSinkFactory {
    pub fn new(device: Option<String>, buffer_frames: usize) -> Self {
        Self {
            device,
            buffer_frames,
        }
    }
}

impl SinkFactory for CpalSinkFactory {
    fn open_sink(&self) -> Result<Box<dyn OutputSink>> {
        Ok(Box::new(CpalSink::open(
            self.device.clone(),
            self.buffer_frames,
        )?))
    }
}

/// Name of the system default output device, if any.
///
/// Used at engine construction to warn early when no device is available,
/// without failing construction.
pub fn default_device_name() -> Option<String> {
    cpal::default_host()
        .default_output_device()
        .and_then(|d| d.name().ok())
}

/// Live cpal output connection
pub struct CpalSink {
    producer: HeapProd<i16>,
    closed: Arc<AtomicBool>,
    stream_error: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the output device and start its stream.
    ///
    /// # Arguments
    /// - `device_name`: Optional device name (None = default device)
    /// - `buffer_frames`: Ring buffer capacity in stereo frames
    ///
    /// # Errors
    /// - No output device available
    /// - Device configuration or stream creation failed
    pub fn open(device_name: Option<String>, buffer_frames: usize) -> Result<Self> {
        let rb = HeapRb::<i16>::new(buffer_frames.max(1) * OUTPUT_CHANNELS as usize);
        let (producer, consumer) = rb.split();

        let closed = Arc::new(AtomicBool::new(false));
        let stream_error = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_closed = Arc::clone(&closed);
        let thread_error = Arc::clone(&stream_error);
        let thread = std::thread::Builder::new()
            .name("vibe-audio-out".to_string())
            .spawn(move || {
                stream_thread(device_name, consumer, thread_closed, thread_error, ready_tx)
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn stream thread: {}", e)))?;

        // The stream is built on the sink thread; surface its open result here
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                producer,
                closed,
                stream_error,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::AudioOutput(
                "Stream thread exited before reporting readiness".to_string(),
            )),
        }
    }
}

impl OutputSink for CpalSink {
    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();

        let mut offset = 0;
        while offset < samples.len() {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::AudioOutput("Sink is closed".to_string()));
            }
            if self.stream_error.load(Ordering::Acquire) {
                return Err(Error::AudioOutput("Audio stream reported an error".to_string()));
            }

            let pushed = self.producer.push_slice(&samples[offset..]);
            offset += pushed;
            if pushed == 0 {
                // Ring full: let the device drain before retrying
                std::thread::sleep(BACKPRESSURE_WAIT);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::Release);

        if let Some(thread) = self.thread.take() {
            debug!("Closing audio sink");
            if thread.join().is_err() {
                warn!("Audio stream thread panicked during close");
            }
        }
        Ok(())
    }

    fn close_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Body of the dedicated stream thread: owns the cpal stream for its lifetime.
fn stream_thread(
    device_name: Option<String>,
    consumer: HeapCons<i16>,
    closed: Arc<AtomicBool>,
    stream_error: Arc<AtomicBool>,
    ready_tx: mpsc::Sender<Result<()>>,
) {
    let stream = match build_stream(device_name, consumer, Arc::clone(&stream_error)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::AudioOutput(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !closed.load(Ordering::Acquire) {
        std::thread::park_timeout(CLOSE_POLL);
    }
    // Stream dropped here, releasing the device handle
    drop(stream);
    debug!("Audio stream thread exited");
}

fn build_stream(
    device_name: Option<String>,
    mut consumer: HeapCons<i16>,
    stream_error: Arc<AtomicBool>,
) -> Result<cpal::Stream> {
    let (device, config, sample_format) = select_device(device_name)?;

    info!(
        "Opening audio output: {} channels @ {}Hz, format {:?}",
        config.channels, config.sample_rate.0, sample_format
    );

    let error_flag = Arc::clone(&stream_error);
    let err_fn = move |err| {
        error!("Audio stream error: {}", err);
        error_flag.store(true, Ordering::Release);
    };

    let stream = match sample_format {
        CpalSampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        // Underrun renders silence rather than stale data
                        *sample = consumer
                            .try_pop()
                            .map(|s| s as f32 / 32768.0)
                            .unwrap_or(0.0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?,
        CpalSampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().unwrap_or(0);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported device sample format: {:?}",
                other
            )));
        }
    };

    Ok(stream)
}

/// Pick the output device and a stereo 44.1kHz configuration.
///
/// A requested device that cannot be found falls back to the default device
/// with a warning, matching the engine's best-effort posture toward devices.
fn select_device(
    device_name: Option<String>,
) -> Result<(Device, StreamConfig, CpalSampleFormat)> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => {
            let found = host
                .output_devices()
                .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                .find(|d| d.name().ok().as_deref() == Some(name.as_str()));

            match found {
                Some(dev) => dev,
                None => {
                    warn!("Requested device '{}' not found, using default", name);
                    host.default_output_device().ok_or_else(|| {
                        Error::AudioOutput("No output device available".to_string())
                    })?
                }
            }
        }
        None => host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device available".to_string()))?,
    };

    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
        .filter(|c| {
            c.channels() == OUTPUT_CHANNELS
                && c.min_sample_rate().0 <= OUTPUT_SAMPLE_RATE
                && c.max_sample_rate().0 >= OUTPUT_SAMPLE_RATE
        })
        .find(|c| {
            matches!(
                c.sample_format(),
                CpalSampleFormat::F32 | CpalSampleFormat::I16
            )
        });

    match supported {
        Some(cfg) => {
            let sample_format = cfg.sample_format();
            let config = cfg
                .with_sample_rate(cpal::SampleRate(OUTPUT_SAMPLE_RATE))
                .config();
            Ok((device, config, sample_format))
        }
        None => {
            // Fall back to whatever the device offers; pitch may be off for
            // non-44.1kHz devices but playback still works
            let cfg = device
                .default_output_config()
                .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
            warn!(
                "No stereo 44.1kHz config available, falling back to {:?} @ {}Hz",
                cfg.sample_format(),
                cfg.sample_rate().0
            );
            let sample_format = cfg.sample_format();
            Ok((device, cfg.config(), sample_format))
        }
    }
}
