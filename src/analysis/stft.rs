//! Magnitude STFT used by every analysis stage
//!
//! Frames are centred: the signal is zero-padded by `n_fft / 2` on both
//! sides so frame `t` is centred on sample `t * hop_length`. This gives
//! `1 + len / hop_length` frames.

use rustfft::{num_complex::Complex, FftPlanner};

/// Default analysis window (93 ms at 22.05 kHz)
pub const N_FFT: usize = 2048;

/// Default hop between frames (23 ms at 22.05 kHz)
pub const HOP_LENGTH: usize = 512;

/// Magnitude spectrogram indexed `[frame][bin]`
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub magnitudes: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop_length: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.magnitudes.len()
    }

    /// Bins per frame (`n_fft / 2 + 1`)
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Bin indices whose centre frequency lies in `[low_hz, high_hz)`
    pub fn bin_range(&self, low_hz: f32, high_hz: f32) -> std::ops::Range<usize> {
        let bins = self.num_bins();
        let start = (0..bins)
            .find(|&k| self.bin_frequency(k) >= low_hz)
            .unwrap_or(bins);
        let end = (start..bins)
            .find(|&k| self.bin_frequency(k) >= high_hz)
            .unwrap_or(bins);
        start..end
    }

    /// Same layout with every magnitude replaced by `f(frame, bin, magnitude)`
    pub fn map(&self, f: impl Fn(usize, usize, f32) -> f32) -> Spectrogram {
        let magnitudes = self
            .magnitudes
            .iter()
            .enumerate()
            .map(|(t, frame)| frame.iter().enumerate().map(|(k, &m)| f(t, k, m)).collect())
            .collect();
        Spectrogram {
            magnitudes,
            n_fft: self.n_fft,
            hop_length: self.hop_length,
            sample_rate: self.sample_rate,
        }
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let x = std::f32::consts::PI * 2.0 * i as f32 / size as f32;
            0.5 - 0.5 * x.cos()
        })
        .collect()
}

/// Centred magnitude STFT of a mono signal
pub fn stft(samples: &[f32], sample_rate: u32, n_fft: usize, hop_length: usize) -> Spectrogram {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let pad = n_fft / 2;
    let num_frames = 1 + samples.len() / hop_length;
    let num_bins = n_fft / 2 + 1;

    let mut magnitudes = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

    for frame in 0..num_frames {
        // Frame start in padded coordinates, shifted back into the signal
        let start = (frame * hop_length) as isize - pad as isize;
        for (i, slot) in buffer.iter_mut().enumerate() {
            let idx = start + i as isize;
            let sample = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize]
            } else {
                0.0
            };
            *slot = Complex::new(sample * window[i], 0.0);
        }

        fft.process(&mut buffer);
        magnitudes.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
    }

    Spectrogram {
        magnitudes,
        n_fft,
        hop_length,
        sample_rate,
    }
}

/// Convert magnitudes to dB relative to the loudest bin, floored `top_db` below it
///
/// `power` selects 10·log10 (true) or 20·log10 (false).
pub fn to_db(spec: &Spectrogram, power: bool, top_db: f32) -> Vec<Vec<f32>> {
    let scale = if power { 10.0 } else { 20.0 };
    let amin = 1e-10f32;

    let db: Vec<Vec<f32>> = spec
        .magnitudes
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&m| {
                    let v = if power { m * m } else { m };
                    scale * v.max(amin).log10()
                })
                .collect()
        })
        .collect();

    let max_db = db
        .iter()
        .flat_map(|f| f.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = max_db - top_db;

    db.into_iter()
        .map(|frame| frame.into_iter().map(|v| v.max(floor) - max_db).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_is_centred() {
        let samples = vec![0.0f32; 22050];
        let spec = stft(&samples, 22050, N_FFT, HOP_LENGTH);
        assert_eq!(spec.num_frames(), 1 + 22050 / 512);
        assert_eq!(spec.magnitudes[0].len(), 1025);
    }

    #[test]
    fn test_sine_peaks_in_expected_bin() {
        let sr = 22050;
        let freq = 1000.0f32;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let spec = stft(&samples, sr as u32, N_FFT, HOP_LENGTH);
        let mid = &spec.magnitudes[spec.num_frames() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert!((spec.bin_frequency(peak) - freq).abs() < 11.0);
    }

    #[test]
    fn test_bin_range_half_open() {
        let spec = stft(&[0.0; 4096], 22050, N_FFT, HOP_LENGTH);
        let range = spec.bin_range(20.0, 60.0);
        assert!(spec.bin_frequency(range.start) >= 20.0);
        assert!(spec.bin_frequency(range.end) >= 60.0);
        assert!(spec.bin_frequency(range.end - 1) < 60.0);
    }

    #[test]
    fn test_db_is_relative_and_floored() {
        let spec = stft(&[1.0; 4096], 22050, N_FFT, HOP_LENGTH);
        let db = to_db(&spec, false, 80.0);
        let max = db.iter().flatten().copied().fold(f32::NEG_INFINITY, f32::max);
        let min = db.iter().flatten().copied().fold(f32::INFINITY, f32::min);
        assert!(max.abs() < 1e-4);
        assert!(min >= -80.0 - 1e-4);
    }
}
