//! Harmonic/percussive separation by median filtering
//!
//! Harmonic energy is smooth along time, percussive energy is smooth along
//! frequency. Each component's mask is a soft (Wiener-style) mask against
//! the other component scaled by a margin; margins above 1 leave a residual
//! that belongs to neither, giving a cleaner separation.

use super::stft::Spectrogram;
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
pub struct HpssConfig {
    /// Median length along time (frames)
    pub kernel_time: usize,
    /// Median length along frequency (bins)
    pub kernel_freq: usize,
    /// Mask exponent
    pub power: f32,
    pub margin_harmonic: f32,
    pub margin_percussive: f32,
}

impl Default for HpssConfig {
    fn default() -> Self {
        Self {
            kernel_time: 31,
            kernel_freq: 31,
            power: 2.0,
            margin_harmonic: 1.0,
            margin_percussive: 1.0,
        }
    }
}

impl HpssConfig {
    /// Wide percussive margin for isolating kicks
    pub fn percussive_focus() -> Self {
        Self {
            margin_harmonic: 1.0,
            margin_percussive: 5.0,
            ..Self::default()
        }
    }
}

/// Separated magnitude spectrograms (same layout as the input)
#[derive(Debug, Clone)]
pub struct Hpss {
    pub harmonic: Spectrogram,
    pub percussive: Spectrogram,
}

fn median(buf: &mut [f32]) -> f32 {
    let mid = buf.len() / 2;
    let (_, m, _) = buf.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Separate `spec` over `bins`; bins outside the range are zero in both outputs
pub fn hpss(spec: &Spectrogram, bins: Range<usize>, config: &HpssConfig) -> Hpss {
    let frames = spec.num_frames();
    let num_bins = spec.num_bins();
    let bins = bins.start.min(num_bins)..bins.end.min(num_bins);

    let zero = spec.map(|_, _, _| 0.0);
    let mut harmonic = zero.clone();
    let mut percussive = zero;
    if frames == 0 || bins.is_empty() {
        return Hpss {
            harmonic,
            percussive,
        };
    }

    let half_t = (config.kernel_time / 2) as isize;
    let half_f = (config.kernel_freq / 2) as isize;
    let mut window = Vec::with_capacity(config.kernel_time.max(config.kernel_freq));

    for t in 0..frames {
        for k in bins.clone() {
            // Harmonic: median along time, edges clamped
            window.clear();
            for dt in -half_t..=half_t {
                let tt = (t as isize + dt).clamp(0, frames as isize - 1) as usize;
                window.push(spec.magnitudes[tt][k]);
            }
            let h = median(&mut window);

            // Percussive: median along frequency
            window.clear();
            for dk in -half_f..=half_f {
                let kk = (k as isize + dk).clamp(0, num_bins as isize - 1) as usize;
                window.push(spec.magnitudes[t][kk]);
            }
            let p = median(&mut window);

            let m = spec.magnitudes[t][k];
            harmonic.magnitudes[t][k] = m * soft_mask(h, p * config.margin_harmonic, config.power);
            percussive.magnitudes[t][k] = m * soft_mask(p, h * config.margin_percussive, config.power);
        }
    }

    Hpss {
        harmonic,
        percussive,
    }
}

/// `x^p / (x^p + reference^p)`, zero where both are zero
fn soft_mask(x: f32, reference: f32, power: f32) -> f32 {
    let xp = x.max(0.0).powf(power);
    let rp = reference.max(0.0).powf(power);
    let total = xp + rp;
    if total <= f32::MIN_POSITIVE {
        0.0
    } else {
        xp / total
    }
}
