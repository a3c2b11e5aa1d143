//! Onset-envelope autocorrelation tempo estimation
//!
//! The envelope's autocorrelation is computed with an FFT
//! (IFFT of the power spectrum), weighted by a log-normal tempo prior and
//! the strongest lag is refined with parabolic interpolation.

use crate::error::{Result, StemgridError};
use rustfft::{num_complex::Complex, FftPlanner};

/// Autocorrelation for lags `0..max_lag` (linear, not circular)
pub fn autocorrelate(signal: &[f32], max_lag: usize) -> Vec<f32> {
    let max_lag = max_lag.min(signal.len());
    if max_lag == 0 {
        return Vec::new();
    }

    let n = (signal.len() * 2).next_power_of_two();
    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut buffer: Vec<Complex<f32>> = signal
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(n)
        .collect();

    forward.process(&mut buffer);
    for c in buffer.iter_mut() {
        *c = Complex::new(c.norm_sqr(), 0.0);
    }
    inverse.process(&mut buffer);

    buffer[..max_lag].iter().map(|c| c.re / n as f32).collect()
}

/// Classical tempo estimator over an onset envelope
#[derive(Debug, Clone)]
pub struct AutocorrelationTempo {
    pub min_bpm: f64,
    pub max_bpm: f64,
    /// Centre of the log-normal prior
    pub prior_bpm: f64,
    /// Prior width in octaves
    pub prior_octaves: f64,
}

impl Default for AutocorrelationTempo {
    fn default() -> Self {
        Self {
            min_bpm: 30.0,
            max_bpm: 300.0,
            prior_bpm: 120.0,
            prior_octaves: 1.0,
        }
    }
}

impl AutocorrelationTempo {
    /// Estimate tempo (unrounded bpm) from an onset envelope sampled at `frame_rate`
    pub fn estimate(&self, onset_envelope: &[f32], frame_rate: f64) -> Result<f64> {
        if !(frame_rate > 0.0) {
            return Err(StemgridError::TempoDetectionError {
                reason: "frame rate must be positive".to_string(),
            });
        }

        let min_lag = ((60.0 * frame_rate / self.max_bpm).floor() as usize).max(1);
        let max_lag = (60.0 * frame_rate / self.min_bpm).ceil() as usize;
        let max_lag = max_lag.min(onset_envelope.len().saturating_sub(1));

        if max_lag <= min_lag {
            return Err(StemgridError::TempoDetectionError {
                reason: format!(
                    "onset envelope too short ({} frames) for autocorrelation",
                    onset_envelope.len()
                ),
            });
        }

        let mean = onset_envelope.iter().sum::<f32>() / onset_envelope.len() as f32;
        let centred: Vec<f32> = onset_envelope.iter().map(|&v| v - mean).collect();
        let acf = autocorrelate(&centred, max_lag + 2);

        let mut best: Option<(usize, f64)> = None;
        for lag in min_lag..=max_lag {
            let bpm = 60.0 * frame_rate / lag as f64;
            let z = (bpm / self.prior_bpm).log2() / self.prior_octaves;
            let score = acf[lag] as f64 * (-0.5 * z * z).exp();
            if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((lag, score));
            }
        }

        let (lag, _) = best.ok_or_else(|| StemgridError::TempoDetectionError {
            reason: "no periodicity found in onset envelope".to_string(),
        })?;

        let refined = lag as f64 + parabolic_offset(&acf, lag);
        Ok(60.0 * frame_rate / refined)
    }
}

/// Sub-sample offset of a peak at `i` from its two neighbours, in [-0.5, 0.5]
fn parabolic_offset(values: &[f32], i: usize) -> f64 {
    if i == 0 || i + 1 >= values.len() {
        return 0.0;
    }
    let (a, b, c) = (values[i - 1] as f64, values[i] as f64, values[i + 1] as f64);
    let denom = a - 2.0 * b + c;
    if denom >= 0.0 {
        return 0.0;
    }
    (0.5 * (a - c) / denom).clamp(-0.5, 0.5)
}
