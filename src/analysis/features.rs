//! Feature extraction: onset envelope, tempogram and band energies
//!
//! Every value is a pure function of the mono samples and the sample rate.
//! Multi-channel input is averaged to mono first; the stereo image is not
//! analysed.

use super::onset::full_band_onset;
use super::stft::{hann_window, stft, to_db, Spectrogram, HOP_LENGTH, N_FFT};
use super::tempo::autocorrelate;
use crate::error::{Result, StemgridError};
use crate::types::{AudioBuffer, Band, FeatureSet};
use std::collections::BTreeMap;
use tracing::debug;

/// Onset frames per tempogram window (~8.9 s at 22.05 kHz / 512)
pub const TEMPOGRAM_WINDOW: usize = 384;

/// Dynamic range for band energies
const TOP_DB: f32 = 80.0;

/// Computes a [`FeatureSet`] from audio
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    n_fft: usize,
    hop_length: usize,
    tempogram_window: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            n_fft: N_FFT,
            hop_length: HOP_LENGTH,
            tempogram_window: TEMPOGRAM_WINDOW,
        }
    }
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Extract features from mono samples
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<FeatureSet> {
        if samples.is_empty() {
            return Err(StemgridError::analysis("cannot extract features from an empty waveform"));
        }
        if sample_rate == 0 {
            return Err(StemgridError::analysis("sample rate must be positive"));
        }

        let spec = stft(samples, sample_rate, self.n_fft, self.hop_length);
        let onset_envelope = full_band_onset(&spec);
        let tempogram = tempogram(&onset_envelope, self.tempogram_window);
        let band_energies = band_energies(&spec);

        debug!(
            "Extracted features: {} frames, {} tempogram lags",
            onset_envelope.len(),
            tempogram.len()
        );

        Ok(FeatureSet {
            onset_envelope,
            tempogram,
            band_energies,
            sample_rate,
            hop_length: self.hop_length,
        })
    }

    /// Extract features from channel-major audio, downmixing to mono
    pub fn extract_channels(&self, channels: &[Vec<f32>], sample_rate: u32) -> Result<FeatureSet> {
        let mono = AudioBuffer::from_channels(channels, sample_rate);
        self.extract(&mono.samples, sample_rate)
    }

    pub fn extract_buffer(&self, buffer: &AudioBuffer) -> Result<FeatureSet> {
        self.extract(&buffer.samples, buffer.sample_rate)
    }
}

/// Local autocorrelation of the onset envelope, indexed `[lag][frame]`
///
/// Each frame's column is the autocorrelation of a Hann-weighted window of
/// the envelope centred on that frame, normalised so lag 0 is 1 (or all
/// zero when the window is silent).
pub fn tempogram(onset_envelope: &[f32], win_length: usize) -> Vec<Vec<f32>> {
    let num_frames = onset_envelope.len();
    let mut out = vec![vec![0.0f32; num_frames]; win_length];
    if num_frames == 0 || win_length == 0 {
        return out;
    }

    let window = hann_window(win_length);
    let half = win_length / 2;
    let mut segment = vec![0.0f32; win_length];

    for t in 0..num_frames {
        for (i, slot) in segment.iter_mut().enumerate() {
            let idx = t as isize + i as isize - half as isize;
            let v = if idx >= 0 && (idx as usize) < num_frames {
                onset_envelope[idx as usize]
            } else {
                0.0
            };
            *slot = v * window[i];
        }

        let acf = autocorrelate(&segment, win_length);
        let norm = acf.first().copied().unwrap_or(0.0);
        if norm > f32::EPSILON {
            for (lag, &v) in acf.iter().enumerate() {
                out[lag][t] = v / norm;
            }
        }
    }

    out
}

/// Mean magnitude in dB per band per frame
///
/// A band with no bins below Nyquist is reported at the dB floor.
pub fn band_energies(spec: &Spectrogram) -> BTreeMap<Band, Vec<f32>> {
    let db = to_db(spec, false, TOP_DB);

    Band::ALL
        .iter()
        .map(|&band| {
            let (low, high) = band.range_hz();
            let bins = spec.bin_range(low, high);
            let curve = if bins.is_empty() {
                vec![-TOP_DB; db.len()]
            } else {
                let width = bins.len() as f32;
                db.iter()
                    .map(|frame| frame[bins.clone()].iter().sum::<f32>() / width)
                    .collect()
            };
            (band, curve)
        })
        .collect()
}
