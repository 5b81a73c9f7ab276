//! Rate conversion from the speech payload rate to the playback context
//!
//! Speech is always mono by the time it gets here (see
//! [`crate::audio::decode::downmix_to_mono`]), so the converter works on a
//! single plane. Output is aligned with the input: the filter delay is
//! trimmed from the front and the tail is flushed, so `n` input samples
//! become `round(n * to / from)` output samples.

use crate::{ChatterError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

const CHUNK_FRAMES: usize = 1024;

pub struct SpeechResampler {
    inner: SincFixedIn<f32>,
    ratio: f64,
}

impl SpeechResampler {
    pub fn new(from_rate: u32, to_rate: u32) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(ChatterError::AudioProcessingError(format!(
                "invalid rate conversion {} Hz -> {} Hz",
                from_rate, to_rate
            )));
        }

        let ratio = to_rate as f64 / from_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.925,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::Blackman,
        };
        let inner = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_FRAMES, 1).map_err(|e| {
            ChatterError::AudioProcessingError(format!("resampler setup failed: {}", e))
        })?;

        Ok(Self { inner, ratio })
    }

    /// Convert a whole utterance in one pass
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>> {
        let wanted = (samples.len() as f64 * self.ratio).round() as usize;
        if wanted == 0 {
            return Ok(Vec::new());
        }

        let delay = self.inner.output_delay();
        let mut converted = Vec::with_capacity(wanted + delay + CHUNK_FRAMES);

        let mut rest = samples;
        while rest.len() >= self.inner.input_frames_next() {
            let (head, tail) = rest.split_at(self.inner.input_frames_next());
            let plane = [head];
            converted.extend(self.run(Some(&plane[..]))?);
            rest = tail;
        }
        if !rest.is_empty() {
            let plane = [rest];
            converted.extend(self.run(Some(&plane[..]))?);
        }

        // zero-fed calls push the delayed tail out of the filter
        while converted.len() < wanted + delay {
            let flushed = self.run(None)?;
            if flushed.is_empty() {
                break;
            }
            converted.extend(flushed);
        }

        converted.drain(..delay.min(converted.len()));
        converted.truncate(wanted);

        debug!(
            "Resampled {} samples to {} (ratio {:.3}, delay {})",
            samples.len(),
            converted.len(),
            self.ratio,
            delay
        );
        Ok(converted)
    }

    fn run(&mut self, plane: Option<&[&[f32]]>) -> Result<Vec<f32>> {
        let mut out = self
            .inner
            .process_partial(plane, None)
            .map_err(|e| ChatterError::AudioProcessingError(format!("resampling failed: {}", e)))?;
        Ok(out.pop().unwrap_or_default())
    }
}

/// Convert mono speech to `to_rate`; samples pass through when rates match
pub fn resample_speech(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    SpeechResampler::new(from_rate, to_rate)?.process(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        assert!(SpeechResampler::new(0, 48_000).is_err());
        assert!(SpeechResampler::new(24_000, 0).is_err());
    }

    #[test]
    fn test_length_follows_ratio() {
        let speech: Vec<f32> = (0..2_400).map(|i| (i as f32 * 0.05).sin()).collect();
        assert_eq!(resample_speech(&speech, 24_000, 48_000).unwrap().len(), 4_800);
        assert_eq!(resample_speech(&speech, 24_000, 16_000).unwrap().len(), 1_600);
        assert_eq!(resample_speech(&speech, 24_000, 44_100).unwrap().len(), 4_410);
    }

    #[test]
    fn test_output_is_not_shifted() {
        let mut click = vec![0.0f32; 2_400];
        click[1_200] = 1.0;

        let upsampled = resample_speech(&click, 24_000, 48_000).unwrap();
        assert!(peak_index(&upsampled).abs_diff(2_400) <= 2);
    }

    #[test]
    fn test_tail_survives() {
        let mut speech = vec![0.0f32; 3_000];
        speech[2_950] = 1.0;

        let upsampled = resample_speech(&speech, 24_000, 48_000).unwrap();
        assert_eq!(upsampled.len(), 6_000);
        assert!(upsampled[5_890..].iter().any(|s| s.abs() > 0.5));
    }

    #[test]
    fn test_same_rate_passthrough() {
        let speech = vec![0.1, -0.2, 0.3];
        assert_eq!(resample_speech(&speech, 24_000, 24_000).unwrap(), speech);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_speech(&[], 24_000, 48_000).unwrap().is_empty());
    }
}
