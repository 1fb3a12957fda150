//! Streaming audio decoder using symphonia
//!
//! Decodes an arbitrary input container (MP3, FLAC, AAC, M4A, Vorbis, WAV)
//! packet-at-a-time into the fixed output format: stereo, 16-bit signed LE,
//! 44.1kHz. Each packet is decoded, folded to stereo (mono duplicated,
//! multi-channel averaged down), resampled, and quantized.
//!
//! Decode errors are returned from [`SymphoniaStream::next_pcm`], not thrown
//! across `play()`; the chain pump turns them into slot failure events.

use crate::audio::resampler::Resampler;
use crate::audio::DecodeStream;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Streaming decode pipeline over a local audio file
pub struct SymphoniaStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    source_rate: u32,
    path: PathBuf,
}

impl SymphoniaStream {
    /// Open a file and prepare it for streaming decode.
    ///
    /// # Errors
    /// - File unreadable
    /// - Container format not recognized
    /// - No decodable audio track
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = File::open(&path)
            .map_err(|e| Error::Decode(format!("Failed to open {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Extension hint helps the probe pick the right reader first
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                Error::Decode(format!("Unrecognized format {}: {}", path.display(), e))
            })?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                Error::Decode(format!("No audio track found in {}", path.display()))
            })?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params.sample_rate.unwrap_or(44100);

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| {
                Error::Decode(format!(
                    "Failed to create decoder for {}: {}",
                    path.display(),
                    e
                ))
            })?;

        debug!(
            "Opened {} (track {}, {}Hz)",
            path.display(),
            track_id,
            source_rate
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            source_rate,
            path,
        })
    }

    /// Decode one packet into interleaved stereo f32 at the source rate
    fn decode_next_packet(&mut self) -> Result<Option<Vec<f32>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(Error::Decode(format!(
                        "{}: packet read failed: {}",
                        self.path.display(),
                        e
                    )));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self.decoder.decode(&packet).map_err(|e| {
                Error::Decode(format!("{}: decode failed: {}", self.path.display(), e))
            })?;

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }

            // SampleBuffer converts any source sample format to f32 for us
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            return Ok(Some(Self::fold_to_stereo(sample_buf.samples(), channels)));
        }
    }

    /// Fold an interleaved n-channel buffer down to interleaved stereo.
    ///
    /// Mono is duplicated; more than two channels are averaged into left/right
    /// by alternating channel index.
    fn fold_to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
        match channels {
            1 => {
                let mut stereo = Vec::with_capacity(samples.len() * 2);
                for &s in samples {
                    stereo.push(s);
                    stereo.push(s);
                }
                stereo
            }
            2 => samples.to_vec(),
            _ => {
                let frames = samples.len() / channels;
                let mut stereo = Vec::with_capacity(frames * 2);
                let half = (channels as f32 / 2.0).max(1.0);

                for frame in samples.chunks_exact(channels) {
                    let mut left = 0.0f32;
                    let mut right = 0.0f32;
                    for (ch, &s) in frame.iter().enumerate() {
                        if ch % 2 == 0 {
                            left += s;
                        } else {
                            right += s;
                        }
                    }
                    stereo.push(left / half);
                    stereo.push(right / half);
                }
                stereo
            }
        }
    }

    /// Quantize f32 samples in [-1, 1] to 16-bit signed LE bytes
    fn f32_to_s16le(samples: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for &s in samples {
            let q = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            bytes.extend_from_slice(&q.to_le_bytes());
        }
        bytes
    }
}

impl DecodeStream for SymphoniaStream {
    fn next_pcm(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            let stereo = match self.decode_next_packet()? {
                Some(s) => s,
                None => return Ok(None),
            };

            let resampled = Resampler::to_output_rate(&stereo, self.source_rate)?;
            if resampled.is_empty() {
                continue;
            }

            return Ok(Some(Self::f32_to_s16le(&resampled)));
        }
    }
}
