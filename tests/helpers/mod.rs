//! Test helper modules for playback integration tests
//!
//! Provides reusable test infrastructure components:
//! - CaptureSinkFactory: in-memory output sinks with inspectable state
//! - WAV fixture generation (sine tones via hound)
//! - Event-channel polling utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use vibe_playback::audio::{OutputSink, SinkFactory, OUTPUT_BYTES_PER_FRAME, OUTPUT_SAMPLE_RATE};
use vibe_playback::PlaybackEvent;

/// Install a tracing subscriber honoring `RUST_LOG` for test output.
///
/// Safe to call from every test; repeated initialization is ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Observable state of one capture sink, shared with the test body.
pub struct SinkState {
    pub bytes: Mutex<Vec<u8>>,
    pub closed: Arc<AtomicBool>,
}

impl SinkState {
    pub fn byte_count(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// True if every captured sample byte is zero.
    pub fn all_silence(&self) -> bool {
        self.bytes.lock().unwrap().iter().all(|&b| b == 0)
    }
}

/// Sink that records written PCM instead of rendering it.
///
/// When throttled, `write` sleeps for the realtime duration of the buffer so
/// playback paces like a real device and fades have time to run.
pub struct CaptureSink {
    state: Arc<SinkState>,
    throttle: bool,
}

impl OutputSink for CaptureSink {
    fn write(&mut self, pcm: &[u8]) -> vibe_playback::Result<()> {
        if self.state.is_closed() {
            return Err(vibe_playback::Error::AudioOutput(
                "sink is closed".to_string(),
            ));
        }
        self.state.bytes.lock().unwrap().extend_from_slice(pcm);
        if self.throttle {
            let frames = pcm.len() / OUTPUT_BYTES_PER_FRAME;
            std::thread::sleep(Duration::from_secs_f64(
                frames as f64 / OUTPUT_SAMPLE_RATE as f64,
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> vibe_playback::Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.state.closed)
    }
}

/// Factory handing out capture sinks and remembering every one it opened,
/// in open order, so tests can inspect sinks after their slot is torn down.
pub struct CaptureSinkFactory {
    handles: Mutex<Vec<Arc<SinkState>>>,
    throttle: bool,
}

impl CaptureSinkFactory {
    pub fn new(throttle: bool) -> Arc<Self> {
        // Every integration test builds a factory, so logging setup rides
        // along instead of needing a call in each test
        init_tracing();
        Arc::new(Self {
            handles: Mutex::new(Vec::new()),
            throttle,
        })
    }

    pub fn opened_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn sink(&self, index: usize) -> Arc<SinkState> {
        Arc::clone(&self.handles.lock().unwrap()[index])
    }
}

impl SinkFactory for CaptureSinkFactory {
    fn open_sink(&self) -> vibe_playback::Result<Box<dyn OutputSink>> {
        let state = Arc::new(SinkState {
            bytes: Mutex::new(Vec::new()),
            closed: Arc::new(AtomicBool::new(false)),
        });
        self.handles.lock().unwrap().push(Arc::clone(&state));
        Ok(Box::new(CaptureSink {
            state,
            throttle: self.throttle,
        }))
    }
}

/// Write a stereo 16-bit 44.1kHz sine tone WAV fixture.
pub fn write_sine_wav(dir: &Path, name: &str, freq_hz: f32, duration_secs: f32) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    let frames = (duration_secs * 44100.0) as u32;
    for n in 0..frames {
        let t = n as f32 / 44100.0;
        let sample = ((t * freq_hz * 2.0 * std::f32::consts::PI).sin() * 0.5 * i16::MAX as f32)
            as i16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Write a file full of zero bytes that no decoder will accept.
pub fn write_garbage_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; 1024]).unwrap();
    path
}

/// Wait until an event matching `pred` arrives, failing the test on timeout.
pub async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<PlaybackEvent>,
    timeout: Duration,
    mut pred: F,
) -> PlaybackEvent
where
    F: FnMut(&PlaybackEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline
            .checked_duration_since(Instant::now())
            .expect("timed out waiting for playback event");
        match tokio::time::timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) if pred(&event) => return event,
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => panic!("event channel error: {}", e),
            Err(_) => panic!("timed out waiting for playback event"),
        }
    }
}
