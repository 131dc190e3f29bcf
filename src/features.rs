use ndarray::{Array1, Array2};
use rustfft::{num_complex::Complex, FftPlanner};

use crate::audio::AudioSample;
use crate::{DiagnosisError, Result};

/// Shape of the extracted feature vector. `Compact` is the 12-dimension
/// vector the basic classifier was trained on; `Extended` is the
/// 21-dimension vector used by the higher-accuracy path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureMode {
    Compact,
    Extended,
}

impl FeatureMode {
    pub const fn dim(self) -> usize {
        match self {
            FeatureMode::Compact => 12,
            FeatureMode::Extended => 21,
        }
    }
}

/// A mode-tagged feature vector. Construction validates shape and
/// finiteness, so a `FeatureVector` in hand is always safe to score.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    mode: FeatureMode,
    values: Array1<f64>,
}

impl FeatureVector {
    fn validated(mode: FeatureMode, values: Vec<f64>) -> Result<Self> {
        if values.len() != mode.dim() {
            return Err(DiagnosisError::FeatureExtraction(format!(
                "expected {} features, got {}",
                mode.dim(),
                values.len()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(DiagnosisError::FeatureExtraction(format!(
                "non-finite value at feature index {}",
                pos
            )));
        }
        Ok(Self {
            mode,
            values: Array1::from(values),
        })
    }

    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn as_slice(&self) -> &[f64] {
        self.values.as_slice().expect("contiguous feature vector")
    }
}

/// Compact-mode band table: half-open [low, high) ranges in Hz.
/// Low band tracks compressor load, 100-500 the compressor itself,
/// 500-1500 the motor, 1.5-3k the fan, 3-8k refrigerant flow.
const COMPACT_BANDS: [(f64, f64); 5] = [
    (10.0, 100.0),
    (100.0, 500.0),
    (500.0, 1500.0),
    (1500.0, 3000.0),
    (3000.0, 8000.0),
];

/// Refrigerant-analysis bands (power-spectrum ratios).
const REFRIGERANT_LOW_BAND: (f64, f64) = (20.0, 200.0);
const REFRIGERANT_FLOW_BAND: (f64, f64) = (200.0, 1500.0);
const REFRIGERANT_STRESS_BAND: (f64, f64) = (1500.0, 8000.0);

/// Mains fundamental for harmonic-distortion measurement.
const MAINS_FUNDAMENTAL_HZ: f64 = 50.0;

const ROLLOFF_RATIO: f64 = 0.85;

/// Spectral quantities consumed by the refrigerant-shortage rule scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct RefrigerantFeatures {
    /// Power ratio in [20,200) Hz - compressor mechanical load.
    pub low_band_energy: f64,
    /// Dominant frequency in [200,1500) Hz - refrigerant flow noise.
    pub flow_peak_hz: f64,
    /// Power ratio in [1500,8000) Hz - system stress.
    pub high_band_energy: f64,
    /// Energy ratio of the 2nd-7th mains harmonics (+-5 Hz windows).
    pub harmonic_distortion: f64,
    pub rms: f64,
    pub crest_factor: f64,
    pub spectral_centroid: f64,
    pub spectral_rolloff: f64,
}

pub struct FeatureExtractor {
    n_fft: usize,
    n_mels: usize,
    n_mfcc: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self {
            n_fft: 2048,
            n_mels: 128,
            n_mfcc: 13,
        }
    }

    /// Extract a fixed-dimension feature vector. Deterministic: the same
    /// audio and mode always produce a bit-identical vector. Interior
    /// numerical edge cases (zero energy, empty band) degrade to 0; only
    /// the final shape/finite check fails the call.
    pub fn extract(&self, audio: &AudioSample, mode: FeatureMode) -> Result<FeatureVector> {
        let values = match mode {
            FeatureMode::Compact => self.extract_compact(audio),
            FeatureMode::Extended => self.extract_extended(audio),
        };
        FeatureVector::validated(mode, values)
    }

    /// 12 features: mean, std, max, min, median, five band-energy ratios,
    /// RMS, crest factor. The buffer is truncated or zero-padded to
    /// exactly one second so time-domain statistics are comparable across
    /// recordings of different lengths.
    fn extract_compact(&self, audio: &AudioSample) -> Vec<f64> {
        let sr = audio.sample_rate() as usize;
        let mut buf: Vec<f32> = audio.samples().to_vec();
        buf.resize(sr, 0.0);

        let mut features = Vec::with_capacity(FeatureMode::Compact.dim());

        features.push(mean(&buf));
        features.push(std_dev(&buf));
        features.push(buf.iter().copied().fold(f64::NEG_INFINITY, |a, b| a.max(b as f64)));
        features.push(buf.iter().copied().fold(f64::INFINITY, |a, b| a.min(b as f64)));
        features.push(median(&buf));

        let (freqs, magnitudes) = magnitude_spectrum(&buf, audio.sample_rate());
        let total: f64 = magnitudes.iter().sum();

        for &(low, high) in &COMPACT_BANDS {
            let band: f64 = freqs
                .iter()
                .zip(&magnitudes)
                .filter(|(f, _)| **f >= low && **f < high)
                .map(|(_, m)| *m)
                .sum();
            features.push(if total > 0.0 { band / total } else { 0.0 });
        }

        let rms = rms(&buf);
        features.push(rms);
        features.push(crest_factor(&buf, rms));

        features
    }

    /// 21 features: mean, std, max, min, 13 frame-averaged MFCCs, then
    /// frame-averaged spectral centroid, roll-off, zero-crossing rate and
    /// bandwidth.
    fn extract_extended(&self, audio: &AudioSample) -> Vec<f64> {
        let buf = audio.samples();
        let sr = audio.sample_rate();

        let mut features = Vec::with_capacity(FeatureMode::Extended.dim());

        features.push(mean(buf));
        features.push(std_dev(buf));
        features.push(buf.iter().copied().fold(f64::NEG_INFINITY, |a, b| a.max(b as f64)));
        features.push(buf.iter().copied().fold(f64::INFINITY, |a, b| a.min(b as f64)));

        let frames = self.frame_starts(buf.len(), sr);
        let spectrogram = self.power_spectrogram(buf, &frames);
        let mfccs = self.mfcc(&spectrogram, sr);
        for i in 0..self.n_mfcc {
            let row = mfccs.row(i);
            features.push(row.mean().unwrap_or(0.0));
        }

        let (centroid, rolloff, bandwidth) = self.spectral_shape(&spectrogram, sr);
        let zcr = self.zero_crossing_rate(buf, &frames);

        features.push(centroid);
        features.push(rolloff);
        features.push(zcr);
        features.push(bandwidth);

        features
    }

    /// Power-spectrum analysis feeding the refrigerant rule scorer.
    pub fn analyze_refrigerant(&self, audio: &AudioSample) -> Result<RefrigerantFeatures> {
        let buf = audio.samples();
        let (freqs, magnitudes) = magnitude_spectrum(buf, audio.sample_rate());
        let power: Vec<f64> = magnitudes.iter().map(|m| m * m).collect();
        let total: f64 = power.iter().sum();

        let band_ratio = |low: f64, high: f64| -> f64 {
            if total <= 0.0 {
                return 0.0;
            }
            let band: f64 = freqs
                .iter()
                .zip(&power)
                .filter(|(f, _)| **f >= low && **f < high)
                .map(|(_, p)| *p)
                .sum();
            band / total
        };

        let low_band_energy = band_ratio(REFRIGERANT_LOW_BAND.0, REFRIGERANT_LOW_BAND.1);
        let high_band_energy = band_ratio(REFRIGERANT_STRESS_BAND.0, REFRIGERANT_STRESS_BAND.1);

        // Dominant frequency in the flow band; 0 when the band is empty
        // or carries no energy.
        let flow_peak_hz = freqs
            .iter()
            .zip(&power)
            .filter(|(f, p)| {
                **f >= REFRIGERANT_FLOW_BAND.0 && **f < REFRIGERANT_FLOW_BAND.1 && **p > 0.0
            })
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(f, _)| *f)
            .unwrap_or(0.0);

        let harmonic_energy: f64 = (2..8)
            .map(|h| {
                let center = MAINS_FUNDAMENTAL_HZ * h as f64;
                freqs
                    .iter()
                    .zip(&power)
                    .filter(|(f, _)| **f >= center - 5.0 && **f < center + 5.0)
                    .map(|(_, p)| *p)
                    .sum::<f64>()
            })
            .sum();
        let harmonic_distortion = if total > 0.0 {
            harmonic_energy / total
        } else {
            0.0
        };

        let rms = rms(buf);
        let crest = crest_factor(buf, rms);

        let spectral_centroid = if total > 0.0 {
            freqs.iter().zip(&power).map(|(f, p)| f * p).sum::<f64>() / total
        } else {
            0.0
        };

        let spectral_rolloff = rolloff_frequency(&freqs, &power, ROLLOFF_RATIO);

        let features = RefrigerantFeatures {
            low_band_energy,
            flow_peak_hz,
            high_band_energy,
            harmonic_distortion,
            rms,
            crest_factor: crest,
            spectral_centroid,
            spectral_rolloff,
        };

        let finite = [
            features.low_band_energy,
            features.flow_peak_hz,
            features.high_band_energy,
            features.harmonic_distortion,
            features.rms,
            features.crest_factor,
            features.spectral_centroid,
            features.spectral_rolloff,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(DiagnosisError::FeatureExtraction(
                "non-finite refrigerant feature".into(),
            ));
        }

        Ok(features)
    }

    fn frame_starts(&self, len: usize, sample_rate: u32) -> Vec<usize> {
        let hop = ((0.025 * sample_rate as f64) as usize).max(1);
        if len < self.n_fft {
            // Shorter than one frame: a single zero-padded frame.
            return vec![0];
        }
        (0..=len - self.n_fft).step_by(hop).collect()
    }

    fn power_spectrogram(&self, buf: &[f32], frames: &[usize]) -> Array2<f64> {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(self.n_fft);
        let n_bins = self.n_fft / 2 + 1;

        let window: Vec<f64> = (0..self.n_fft)
            .map(|i| {
                0.5 * (1.0
                    - (2.0 * std::f64::consts::PI * i as f64 / (self.n_fft - 1) as f64).cos())
            })
            .collect();

        let mut spectrogram = Array2::zeros((n_bins, frames.len()));

        for (frame_idx, &start) in frames.iter().enumerate() {
            let mut windowed: Vec<Complex<f64>> = (0..self.n_fft)
                .map(|i| {
                    let sample = buf.get(start + i).copied().unwrap_or(0.0) as f64;
                    Complex::new(sample * window[i], 0.0)
                })
                .collect();

            fft.process(&mut windowed);

            for (bin, value) in windowed.iter().take(n_bins).enumerate() {
                spectrogram[[bin, frame_idx]] = value.norm_sqr();
            }
        }

        spectrogram
    }

    fn mfcc(&self, spectrogram: &Array2<f64>, sample_rate: u32) -> Array2<f64> {
        let mel_filters = self.mel_filterbank(sample_rate);
        let mel_spectrogram = mel_filters.dot(spectrogram);
        let log_mel = mel_spectrogram.mapv(|x| (x + 1e-10).ln());

        let (n_mels, n_frames) = log_mel.dim();
        let mut mfccs = Array2::zeros((self.n_mfcc, n_frames));

        // DCT-II over the mel axis.
        for frame in 0..n_frames {
            for i in 0..self.n_mfcc {
                let mut sum = 0.0;
                for j in 0..n_mels {
                    sum += log_mel[[j, frame]]
                        * (std::f64::consts::PI * i as f64 * (j as f64 + 0.5) / n_mels as f64)
                            .cos();
                }
                mfccs[[i, frame]] = sum;
            }
        }

        mfccs
    }

    fn mel_filterbank(&self, sample_rate: u32) -> Array2<f64> {
        let n_bins = self.n_fft / 2 + 1;
        let mut filters = Array2::zeros((self.n_mels, n_bins));

        let mel_low = hz_to_mel(0.0);
        let mel_high = hz_to_mel(sample_rate as f64 / 2.0);
        let bin_points: Vec<usize> = (0..=self.n_mels + 1)
            .map(|i| {
                let mel = mel_low + (mel_high - mel_low) * i as f64 / (self.n_mels + 1) as f64;
                let hz = mel_to_hz(mel);
                ((hz * self.n_fft as f64) / sample_rate as f64).floor() as usize
            })
            .collect();

        for m in 0..self.n_mels {
            let left = bin_points[m];
            let center = bin_points[m + 1];
            let right = bin_points[m + 2];

            for k in left..=right.min(n_bins - 1) {
                // Collapsed triangles (bins coincide at low frequencies)
                // contribute nothing rather than dividing by zero.
                if k <= center && center > left {
                    filters[[m, k]] = (k - left) as f64 / (center - left) as f64;
                } else if k > center && right > center {
                    filters[[m, k]] = (right - k) as f64 / (right - center) as f64;
                }
            }
        }

        filters
    }

    /// Frame-averaged centroid, roll-off and bandwidth from the power
    /// spectrogram. Silent frames contribute 0.
    fn spectral_shape(&self, spectrogram: &Array2<f64>, sample_rate: u32) -> (f64, f64, f64) {
        let (n_bins, n_frames) = spectrogram.dim();
        if n_frames == 0 {
            return (0.0, 0.0, 0.0);
        }

        let bin_freqs: Vec<f64> = (0..n_bins)
            .map(|k| k as f64 * sample_rate as f64 / self.n_fft as f64)
            .collect();

        let mut centroid_sum = 0.0;
        let mut rolloff_sum = 0.0;
        let mut bandwidth_sum = 0.0;

        for frame in 0..n_frames {
            let column = spectrogram.column(frame);
            let magnitudes: Vec<f64> = column.iter().map(|p| p.sqrt()).collect();
            let total: f64 = magnitudes.iter().sum();
            if total <= 0.0 {
                continue;
            }

            let centroid = bin_freqs
                .iter()
                .zip(&magnitudes)
                .map(|(f, m)| f * m)
                .sum::<f64>()
                / total;
            centroid_sum += centroid;

            rolloff_sum += rolloff_frequency(&bin_freqs, &magnitudes, ROLLOFF_RATIO);

            let variance = bin_freqs
                .iter()
                .zip(&magnitudes)
                .map(|(f, m)| (f - centroid).powi(2) * m)
                .sum::<f64>()
                / total;
            bandwidth_sum += variance.sqrt();
        }

        let n = n_frames as f64;
        (centroid_sum / n, rolloff_sum / n, bandwidth_sum / n)
    }

    fn zero_crossing_rate(&self, buf: &[f32], frames: &[usize]) -> f64 {
        if frames.is_empty() {
            return 0.0;
        }

        let mut total = 0.0;
        for &start in frames {
            let end = (start + self.n_fft).min(buf.len());
            if end <= start + 1 {
                continue;
            }
            let frame = &buf[start..end];
            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            total += crossings as f64 / frame.len() as f64;
        }
        total / frames.len() as f64
    }
}

fn mean(buf: &[f32]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    buf.iter().map(|&s| s as f64).sum::<f64>() / buf.len() as f64
}

fn std_dev(buf: &[f32]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    let m = mean(buf);
    let variance = buf.iter().map(|&s| (s as f64 - m).powi(2)).sum::<f64>() / buf.len() as f64;
    variance.sqrt()
}

fn median(buf: &[f32]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = buf.iter().map(|&s| s as f64).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn rms(buf: &[f32]) -> f64 {
    if buf.is_empty() {
        return 0.0;
    }
    let mean_sq = buf.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / buf.len() as f64;
    mean_sq.sqrt()
}

fn crest_factor(buf: &[f32], rms: f64) -> f64 {
    if rms <= 0.0 {
        return 0.0;
    }
    let peak = buf.iter().map(|s| s.abs() as f64).fold(0.0, f64::max);
    peak / rms
}

/// Single full-buffer FFT; returns (frequency, magnitude) pairs for the
/// strictly positive frequencies.
fn magnitude_spectrum(buf: &[f32], sample_rate: u32) -> (Vec<f64>, Vec<f64>) {
    let n = buf.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);

    let mut spectrum: Vec<Complex<f64>> = buf
        .iter()
        .map(|&s| Complex::new(s as f64, 0.0))
        .collect();
    fft.process(&mut spectrum);

    let freq_step = sample_rate as f64 / n as f64;
    let positive = 1..(n + 1) / 2;

    let freqs: Vec<f64> = positive.clone().map(|i| i as f64 * freq_step).collect();
    let magnitudes: Vec<f64> = positive.map(|i| spectrum[i].norm()).collect();

    (freqs, magnitudes)
}

/// Frequency below which `ratio` of the total energy is contained; 0 for
/// a silent spectrum.
fn rolloff_frequency(freqs: &[f64], energies: &[f64], ratio: f64) -> f64 {
    let total: f64 = energies.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = ratio * total;
    let mut cumulative = 0.0;
    for (f, e) in freqs.iter().zip(energies) {
        cumulative += e;
        if cumulative >= threshold {
            return *f;
        }
    }
    freqs.last().copied().unwrap_or(0.0)
}

/// Hz to mel (HTK formula).
fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz (HTK formula).
fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}
