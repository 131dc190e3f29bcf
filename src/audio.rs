use hound::WavReader;
use std::path::Path;

use crate::{DiagnosisError, Result};

/// A validated mono audio buffer. Samples are finite and the buffer is
/// non-empty; anything else is rejected at construction so downstream
/// feature extraction never sees malformed input.
#[derive(Debug, Clone)]
pub struct AudioSample {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSample {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(DiagnosisError::InvalidAudio("empty buffer".into()));
        }
        if sample_rate == 0 {
            return Err(DiagnosisError::InvalidAudio("zero sample rate".into()));
        }
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DiagnosisError::InvalidAudio(format!(
                "non-finite sample at index {}",
                pos
            )));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

pub struct AudioProcessor {
    target_sample_rate: u32,
}

impl AudioProcessor {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    /// Load a WAV file, downmix to mono and resample to the target rate.
    pub fn load_audio_file<P: AsRef<Path>>(&self, path: P) -> Result<AudioSample> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        let audio_data = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<f32>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|sample| sample as f32 / max))
                    .collect::<std::result::Result<Vec<f32>, _>>()?
            }
        };

        let mut processed = audio_data;

        if spec.channels > 1 {
            processed = downmix_to_mono(&processed, spec.channels as usize);
        }

        if spec.sample_rate != self.target_sample_rate {
            processed = resample(&processed, spec.sample_rate, self.target_sample_rate);
        }

        AudioSample::new(processed, self.target_sample_rate)
    }

    /// Split audio into consecutive fixed-duration chunks; a trailing
    /// remainder shorter than one chunk is discarded.
    pub fn extract_chunks(&self, audio: &AudioSample, chunk_duration: f32) -> Vec<AudioSample> {
        let chunk_size = (chunk_duration * audio.sample_rate() as f32) as usize;
        if chunk_size == 0 {
            return Vec::new();
        }

        audio
            .samples()
            .chunks_exact(chunk_size)
            .filter_map(|chunk| AudioSample::new(chunk.to_vec(), audio.sample_rate()).ok())
            .collect()
    }
}

fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// Linear interpolation resampling, matching what was used when the
// training data was prepared.
fn resample(audio: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let ratio = to_rate as f32 / from_rate as f32;
    let new_length = (audio.len() as f32 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_length);

    for i in 0..new_length {
        let src_index = i as f32 / ratio;
        let src_floor = src_index.floor() as usize;
        let src_ceil = (src_floor + 1).min(audio.len() - 1);
        let fraction = src_index - src_floor as f32;

        let sample = if src_floor < audio.len() {
            audio[src_floor] * (1.0 - fraction) + audio[src_ceil] * fraction
        } else {
            0.0
        };

        resampled.push(sample);
    }

    resampled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_rejected() {
        let err = AudioSample::new(vec![], 16000).unwrap_err();
        assert!(matches!(err, DiagnosisError::InvalidAudio(_)));
    }

    #[test]
    fn non_finite_sample_rejected() {
        let err = AudioSample::new(vec![0.1, f32::NAN, 0.2], 16000).unwrap_err();
        assert!(matches!(err, DiagnosisError::InvalidAudio(_)));
    }

    #[test]
    fn chunking_drops_trailing_remainder() {
        let audio = AudioSample::new(vec![0.5; 2500], 1000).unwrap();
        let processor = AudioProcessor::new(1000);

        let chunks = processor.extract_chunks(&audio, 1.0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1000));
    }

    #[test]
    fn downmix_averages_channels() {
        let mono = downmix_to_mono(&[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn resample_preserves_duration() {
        let audio: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.001).sin()).collect();
        let out = resample(&audio, 16000, 22050);
        assert_eq!(out.len(), 22050);
    }
}
