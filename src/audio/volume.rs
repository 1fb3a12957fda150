//! Volume stage: programmable digital gain over raw PCM
//!
//! A pure streaming transform with one piece of mutable state, the current
//! gain in [0, 1]. The gain is shared behind an `Arc<Mutex<f32>>` so the fade
//! timer can change it between buffer calls while the chain pump reads it per
//! buffer; a single buffer is always scaled with one gain value.
//!
//! Exactness guarantees:
//! - gain 0.0 produces the zero-byte pattern, not near-zero rounding residue
//! - gain 1.0 is a byte-for-byte copy, not a requantized multiply
//! - intermediate gains round per sample and clamp to the format's range

use crate::audio::types::SampleFormat;
use std::sync::{Arc, Mutex};

/// Gain-scaling transform over raw PCM byte buffers
#[derive(Clone)]
pub struct VolumeStage {
    gain: Arc<Mutex<f32>>,
    format: SampleFormat,
}

impl VolumeStage {
    /// Create a volume stage at the given initial gain (clamped to [0, 1])
    pub fn new(initial_gain: f32, format: SampleFormat) -> Self {
        Self {
            gain: Arc::new(Mutex::new(initial_gain.clamp(0.0, 1.0))),
            format,
        }
    }

    /// Set the gain, clamped to [0, 1]
    pub fn set_gain(&self, gain: f32) {
        *self.gain.lock().unwrap() = gain.clamp(0.0, 1.0);
    }

    /// Current gain
    pub fn gain(&self) -> f32 {
        *self.gain.lock().unwrap()
    }

    /// Scale one PCM buffer by the current gain.
    ///
    /// Output length always equals input length. A trailing partial sample
    /// (buffer not a multiple of the sample size) is copied through unchanged.
    pub fn apply(&self, chunk: &[u8]) -> Vec<u8> {
        let gain = self.gain();

        if gain == 0.0 {
            return vec![0u8; chunk.len()];
        }
        if gain == 1.0 {
            return chunk.to_vec();
        }

        let mut output = chunk.to_vec();
        match self.format {
            SampleFormat::S8 => Self::scale_s8(&mut output, gain),
            SampleFormat::S16 => Self::scale_s16(&mut output, gain),
            SampleFormat::S24 => Self::scale_s24(&mut output, gain),
            SampleFormat::F32 => Self::scale_f32(&mut output, gain),
        }
        output
    }

    fn scale_s8(buf: &mut [u8], gain: f32) {
        for byte in buf.iter_mut() {
            let sample = *byte as i8;
            let adjusted = (sample as f32 * gain).round() as i32;
            *byte = adjusted.clamp(i8::MIN as i32, i8::MAX as i32) as i8 as u8;
        }
    }

    fn scale_s16(buf: &mut [u8], gain: f32) {
        for sample_bytes in buf.chunks_exact_mut(2) {
            let sample = i16::from_le_bytes([sample_bytes[0], sample_bytes[1]]);
            let adjusted = (sample as f32 * gain).round() as i32;
            let clamped = adjusted.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            sample_bytes.copy_from_slice(&clamped.to_le_bytes());
        }
    }

    fn scale_s24(buf: &mut [u8], gain: f32) {
        const MIN_S24: i32 = -8_388_608;
        const MAX_S24: i32 = 8_388_607;

        for sample_bytes in buf.chunks_exact_mut(3) {
            let mut sample = (sample_bytes[2] as i32) << 16
                | (sample_bytes[1] as i32) << 8
                | sample_bytes[0] as i32;
            // Sign-extend from 24 bits
            if sample & 0x80_0000 != 0 {
                sample |= !0xFF_FFFF;
            }

            let adjusted = (sample as f64 * gain as f64).round() as i64;
            let clamped = adjusted.clamp(MIN_S24 as i64, MAX_S24 as i64) as i32;

            sample_bytes[0] = (clamped & 0xFF) as u8;
            sample_bytes[1] = ((clamped >> 8) & 0xFF) as u8;
            sample_bytes[2] = ((clamped >> 16) & 0xFF) as u8;
        }
    }

    fn scale_f32(buf: &mut [u8], gain: f32) {
        for sample_bytes in buf.chunks_exact_mut(4) {
            let sample = f32::from_le_bytes([
                sample_bytes[0],
                sample_bytes[1],
                sample_bytes[2],
                sample_bytes[3],
            ]);
            sample_bytes.copy_from_slice(&(sample * gain).to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16_buffer(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_zero_gain_is_exact_silence_all_formats() {
        let input: Vec<u8> = (0u8..=255).cycle().take(96).collect();

        for format in [
            SampleFormat::S8,
            SampleFormat::S16,
            SampleFormat::S24,
            SampleFormat::F32,
        ] {
            let stage = VolumeStage::new(0.0, format);
            let output = stage.apply(&input);
            assert_eq!(output.len(), input.len());
            assert!(
                output.iter().all(|&b| b == 0),
                "{:?} at gain 0 must zero-fill",
                format
            );
        }
    }

    #[test]
    fn test_unity_gain_is_byte_identical() {
        let input: Vec<u8> = (0u8..=255).collect();

        for format in [
            SampleFormat::S8,
            SampleFormat::S16,
            SampleFormat::S24,
            SampleFormat::F32,
        ] {
            let stage = VolumeStage::new(1.0, format);
            assert_eq!(stage.apply(&input), input, "{:?} at gain 1", format);
        }
    }

    #[test]
    fn test_half_gain_s16() {
        let stage = VolumeStage::new(0.5, SampleFormat::S16);
        let output = stage.apply(&s16_buffer(&[1000, -1000, 0]));

        assert_eq!(output, s16_buffer(&[500, -500, 0]));
    }

    #[test]
    fn test_s16_extremes_do_not_wrap() {
        // Gain is clamped to 1.0, so the largest multiplier ever applied is 1;
        // the clamp still has to hold for extreme samples near the boundary.
        let stage = VolumeStage::new(0.999_999, SampleFormat::S16);
        let output = stage.apply(&s16_buffer(&[i16::MAX, i16::MIN]));

        let max = i16::from_le_bytes([output[0], output[1]]);
        let min = i16::from_le_bytes([output[2], output[3]]);
        assert!(max > 0, "positive max must not wrap negative, got {}", max);
        assert!(min < 0, "negative min must not wrap positive, got {}", min);
    }

    #[test]
    fn test_gain_clamped_to_unit_range() {
        let stage = VolumeStage::new(2.5, SampleFormat::S16);
        assert_eq!(stage.gain(), 1.0);

        stage.set_gain(-0.3);
        assert_eq!(stage.gain(), 0.0);

        stage.set_gain(1.7);
        assert_eq!(stage.gain(), 1.0);
    }

    #[test]
    fn test_gain_change_between_buffers() {
        let stage = VolumeStage::new(1.0, SampleFormat::S16);
        let input = s16_buffer(&[2000]);

        assert_eq!(stage.apply(&input), input);
        stage.set_gain(0.25);
        assert_eq!(stage.apply(&input), s16_buffer(&[500]));
    }

    #[test]
    fn test_s24_sign_extension() {
        // -1 in s24 LE is FF FF FF
        let stage = VolumeStage::new(0.5, SampleFormat::S24);
        let output = stage.apply(&[0xFF, 0xFF, 0xFF]);
        // round(-1 * 0.5) = -1 (round half away from zero) → 0 or -1 depending
        // on rounding; f64 round gives -0.5.round() = -1
        let mut sample = (output[2] as i32) << 16 | (output[1] as i32) << 8 | output[0] as i32;
        if sample & 0x80_0000 != 0 {
            sample |= !0xFF_FFFF;
        }
        assert!(sample == -1 || sample == 0);
    }

    #[test]
    fn test_f32_scaling() {
        let stage = VolumeStage::new(0.5, SampleFormat::F32);
        let input: Vec<u8> = 0.8f32.to_le_bytes().to_vec();
        let output = stage.apply(&input);
        let scaled = f32::from_le_bytes([output[0], output[1], output[2], output[3]]);
        assert!((scaled - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_shared_gain_across_clones() {
        let stage = VolumeStage::new(1.0, SampleFormat::S16);
        let clone = stage.clone();

        stage.set_gain(0.3);
        assert!((clone.gain() - 0.3).abs() < f32::EPSILON);
    }
}
