//! Chroma, tonal centroid (tonnetz) and harmonic change

use super::stft::Spectrogram;
use std::f32::consts::PI;

/// Lowest frequency folded into chroma (A0)
pub const CHROMA_MIN_HZ: f32 = 27.5;

/// Highest frequency folded into chroma
pub const CHROMA_MAX_HZ: f32 = 5000.0;

/// Energy per pitch class per frame, each frame scaled so its maximum is 1
///
/// Pitch class 0 is C. Silent frames stay all zero.
pub fn chroma(spec: &Spectrogram) -> Vec<[f32; 12]> {
    let bins = spec.bin_range(CHROMA_MIN_HZ, CHROMA_MAX_HZ);
    let classes: Vec<(usize, usize)> = bins
        .map(|k| {
            let freq = spec.bin_frequency(k);
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            (k, (midi.round() as i64).rem_euclid(12) as usize)
        })
        .collect();

    spec.magnitudes
        .iter()
        .map(|frame| {
            let mut c = [0.0f32; 12];
            for &(k, pc) in &classes {
                c[pc] += frame[k] * frame[k];
            }
            let max = c.iter().copied().fold(0.0f32, f32::max);
            if max > 0.0 {
                c.iter_mut().for_each(|v| *v /= max);
            }
            c
        })
        .collect()
}

/// Project chroma onto the six tonal centroid axes
///
/// Axes are the circle of fifths, minor thirds and major thirds, each as a
/// (sin, cos) pair. Chroma is L1 normalised per frame first.
pub fn tonnetz(chroma: &[[f32; 12]]) -> Vec<[f32; 6]> {
    const AXES: [(f32, f32); 3] = [(1.0, 7.0 / 6.0), (1.0, 3.0 / 2.0), (0.5, 2.0 / 3.0)];

    chroma
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            let mut centroid = [0.0f32; 6];
            if total <= 0.0 {
                return centroid;
            }
            for (pc, &energy) in frame.iter().enumerate() {
                let weight = energy / total;
                for (axis, &(radius, turns)) in AXES.iter().enumerate() {
                    let angle = pc as f32 * turns * PI;
                    centroid[axis * 2] += weight * radius * angle.sin();
                    centroid[axis * 2 + 1] += weight * radius * angle.cos();
                }
            }
            centroid
        })
        .collect()
}

/// Squared distance between consecutive tonal centroids (first frame is 0)
pub fn harmonic_change(tonnetz: &[[f32; 6]]) -> Vec<f32> {
    let mut out = vec![0.0f32; tonnetz.len()];
    for t in 1..tonnetz.len() {
        out[t] = tonnetz[t]
            .iter()
            .zip(tonnetz[t - 1].iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::stft::{stft, HOP_LENGTH, N_FFT};

    fn tone(freq: f32, sr: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_a440_maps_to_pitch_class_a() {
        let spec = stft(&tone(440.0, 22050, 22050), 22050, N_FFT, HOP_LENGTH);
        let c = chroma(&spec);
        let mid = c[c.len() / 2];
        let best = (0..12).max_by(|&a, &b| mid[a].total_cmp(&mid[b])).unwrap();
        assert_eq!(best, 9);
        assert!((mid[9] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_silence_has_zero_centroid() {
        let t = tonnetz(&[[0.0; 12]]);
        assert_eq!(t[0], [0.0; 6]);
    }

    #[test]
    fn test_chord_change_spikes_harmonic_change() {
        let sr = 22050;
        let mut samples = tone(261.63, sr, 22050);
        samples.extend(tone(369.99, sr, 22050));
        let spec = stft(&samples, sr, N_FFT, HOP_LENGTH);
        let change = harmonic_change(&tonnetz(&chroma(&spec)));
        let boundary = 22050 / HOP_LENGTH;
        let peak = change
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(t, _)| t)
            .unwrap();
        assert!(peak.abs_diff(boundary) <= 3, "peak at {}", peak);
    }
}
