//! Audio pipeline components
//!
//! Decode, volume, and device-output stages for one player slot, plus the
//! capability traits that keep the scheduler independent of any platform's
//! native decode/output facility.

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;
pub mod volume;

pub use decoder::SymphoniaStream;
pub use output::{CpalSink, CpalSinkFactory};
pub use types::{
    SampleFormat, OUTPUT_BYTES_PER_FRAME, OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE,
};
pub use volume::VolumeStage;

use crate::error::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Decode half of a slot's chain.
///
/// Produces chunks of raw PCM in the fixed output format (stereo, 16-bit
/// signed LE, 44.1kHz). Decoding is pull-based: the chain pump calls
/// `next_pcm` until it returns `Ok(None)` (end-of-stream) or `Err` (decode
/// failure). Forced early termination is the pump's kill flag, which is safe
/// to set after the stream has already ended.
pub trait DecodeStream: Send {
    /// Decode the next chunk.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - one chunk of stereo/s16le/44.1kHz PCM
    /// - `Ok(None)` - end of stream
    /// - `Err` - decode failure (corrupt data, unsupported codec)
    fn next_pcm(&mut self) -> Result<Option<Vec<u8>>>;
}

/// One live connection to an audio output.
///
/// `write` renders raw PCM in real time and respects backpressure: a sink
/// that cannot keep up blocks the caller rather than dropping samples.
/// `close` must be idempotent; closing an already-terminated sink is a no-op.
pub trait OutputSink: Send {
    /// Write raw PCM bytes (stereo, s16le, 44.1kHz) to the output.
    fn write(&mut self, pcm: &[u8]) -> Result<()>;

    /// Close the output. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Flag that aborts a `write` stuck in backpressure.
    ///
    /// The returned flag is shared with the sink: once set, an in-progress
    /// `write` stops retrying and returns an error. The scheduler holds this
    /// flag outside the sink lock so teardown can interrupt the writer even
    /// though `close` itself waits for that lock. Sinks whose `write` can
    /// block must override this and observe the flag in their retry loop.
    fn close_signal(&self) -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }
}

/// Creates output sinks.
///
/// The scheduler goes through this trait so a different device backend (or a
/// capture sink in tests) can be swapped in without touching scheduler logic.
pub trait SinkFactory: Send + Sync {
    fn open_sink(&self) -> Result<Box<dyn OutputSink>>;
}
