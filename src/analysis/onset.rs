//! Onset strength (spectral flux in dB)

use super::stft::{to_db, Spectrogram};
use std::ops::Range;

/// Dynamic range kept below the loudest bin
const TOP_DB: f32 = 80.0;

/// Positive spectral flux of the power spectrogram in dB, averaged over `bins`
///
/// Frame 0 has no predecessor and is always 0. An empty bin range yields a
/// zero envelope of the right length.
pub fn onset_strength(spec: &Spectrogram, bins: Range<usize>) -> Vec<f32> {
    let num_frames = spec.num_frames();
    let mut envelope = vec![0.0f32; num_frames];

    let bins = bins.start.min(spec.num_bins())..bins.end.min(spec.num_bins());
    if bins.is_empty() || num_frames < 2 {
        return envelope;
    }

    let db = to_db(spec, true, TOP_DB);
    let width = bins.len() as f32;

    for t in 1..num_frames {
        let flux: f32 = bins
            .clone()
            .map(|k| (db[t][k] - db[t - 1][k]).max(0.0))
            .sum();
        envelope[t] = flux / width;
    }

    envelope
}

/// Onset strength over the whole spectrum
pub fn full_band_onset(spec: &Spectrogram) -> Vec<f32> {
    onset_strength(spec, 0..spec.num_bins())
}

/// Onset strength restricted to `[low_hz, high_hz)`
pub fn band_onset(spec: &Spectrogram, low_hz: f32, high_hz: f32) -> Vec<f32> {
    onset_strength(spec, spec.bin_range(low_hz, high_hz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stft::{stft, HOP_LENGTH, N_FFT};

    #[test]
    fn test_silence_has_no_onsets() {
        let spec = stft(&vec![0.0; 22050], 22050, N_FFT, HOP_LENGTH);
        let env = full_band_onset(&spec);
        assert_eq!(env.len(), spec.num_frames());
        assert!(env.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_click_produces_peak_at_click() {
        let mut samples = vec![0.0f32; 22050];
        let click_at = 11025;
        for i in 0..64 {
            samples[click_at + i] = if i % 2 == 0 { 0.9 } else { -0.9 };
        }
        let spec = stft(&samples, 22050, N_FFT, HOP_LENGTH);
        let env = full_band_onset(&spec);
        let peak = env
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(t, _)| t)
            .unwrap();
        let click_frame = click_at / HOP_LENGTH;
        assert!(peak.abs_diff(click_frame) <= 2, "peak at {}", peak);
        assert_eq!(env[0], 0.0);
    }
}
