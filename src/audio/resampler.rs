//! Sample rate conversion using rubato
//!
//! Every decoded chunk is normalized to the fixed 44.1kHz output rate before
//! it reaches the volume stage and sink. The pipeline is stereo by the time it
//! gets here (the decoder folds channels first), so this module only handles
//! two-channel audio.

use crate::audio::types::OUTPUT_SAMPLE_RATE;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::trace;

/// Stereo resampler to the fixed output rate.
pub struct Resampler;

impl Resampler {
    /// Resample interleaved stereo samples to 44.1kHz.
    ///
    /// # Arguments
    /// - `input`: Interleaved stereo samples [L, R, L, R, ...]
    /// - `input_rate`: Input sample rate
    ///
    /// # Returns
    /// Resampled interleaved stereo audio at 44.1kHz. Input already at
    /// 44.1kHz is returned as a copy without resampling.
    pub fn to_output_rate(input: &[f32], input_rate: u32) -> Result<Vec<f32>> {
        if input_rate == OUTPUT_SAMPLE_RATE {
            return Ok(input.to_vec());
        }
        if input.is_empty() {
            return Ok(Vec::new());
        }

        let planar_input = Self::deinterleave(input);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            OUTPUT_SAMPLE_RATE as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            2,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        trace!(
            "Resampled {} frames @ {}Hz to {} frames @ {}Hz",
            input_frames,
            input_rate,
            planar_output[0].len(),
            OUTPUT_SAMPLE_RATE
        );

        Ok(Self::interleave(&planar_output))
    }

    /// [L, R, L, R, ...] → [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32]) -> Vec<Vec<f32>> {
        let frames = samples.len() / 2;
        let mut left = Vec::with_capacity(frames);
        let mut right = Vec::with_capacity(frames);

        for frame in samples.chunks_exact(2) {
            left.push(frame[0]);
            right.push(frame[1]);
        }

        vec![left, right]
    }

    /// [[L, L, ...], [R, R, ...]] → [L, R, L, R, ...]
    fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
        let frames = planar[0].len();
        let mut interleaved = Vec::with_capacity(frames * 2);

        for i in 0..frames {
            interleaved.push(planar[0][i]);
            interleaved.push(planar[1][i]);
        }

        interleaved
    }
}
