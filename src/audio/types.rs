//! Fixed output format and sample format descriptions
//!
//! Every decode pipeline normalizes to one output format so the volume stage
//! and sink never have to negotiate: stereo, 16-bit signed little-endian,
//! 44.1kHz.

/// Output sample rate for all playback
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Output channel count (stereo)
pub const OUTPUT_CHANNELS: u16 = 2;

/// Bytes per sample in the output format (16-bit)
pub const OUTPUT_BYTES_PER_SAMPLE: usize = 2;

/// Bytes per stereo frame in the output format
pub const OUTPUT_BYTES_PER_FRAME: usize = OUTPUT_CHANNELS as usize * OUTPUT_BYTES_PER_SAMPLE;

/// PCM sample formats the volume stage can scale
///
/// The fixed output path uses `S16`; the other formats exist because the
/// volume stage is a pure byte transform usable on any PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// 8-bit signed integer
    S8,
    /// 16-bit signed integer, little-endian
    S16,
    /// 24-bit signed integer, little-endian (3 bytes per sample)
    S24,
    /// 32-bit float, little-endian
    F32,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::S8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::F32 => 4,
        }
    }
}
