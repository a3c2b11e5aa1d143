//! Dynamic-programming beat tracker (Ellis 2007)
//!
//! The tempo comes from onset autocorrelation. Each frame's cumulative score
//! is its local onset score plus the best predecessor within
//! `[t - 2p, t - p/2]`, penalised by the squared log ratio of the gap to the
//! beat period `p`.

use super::tempo::AutocorrelationTempo;
use tracing::trace;

/// Beat period deviation penalty
pub const TIGHTNESS: f64 = 100.0;

/// Output of the beat tracker
#[derive(Debug, Clone, PartialEq)]
pub struct BeatTrack {
    /// Global tempo the grid was built for
    pub tempo: f64,
    /// Beat positions in onset frames, ascending
    pub beats: Vec<usize>,
}

impl BeatTrack {
    /// Beat positions in seconds
    pub fn times(&self, frame_rate: f64) -> Vec<f64> {
        self.beats.iter().map(|&b| b as f64 / frame_rate).collect()
    }
}

/// Track beats in an onset envelope
///
/// Returns `None` when the envelope carries no usable periodicity.
pub fn beat_track(onset: &[f32], frame_rate: f64) -> Option<BeatTrack> {
    let tempo = AutocorrelationTempo::default().estimate(onset, frame_rate).ok()?;
    let beats = track_with_tempo(onset, frame_rate, tempo, TIGHTNESS)?;
    Some(BeatTrack { tempo, beats })
}

/// Beat frames for a known tempo
pub fn track_with_tempo(onset: &[f32], frame_rate: f64, tempo: f64, tightness: f64) -> Option<Vec<usize>> {
    if onset.is_empty() || !(tempo > 0.0) || !(frame_rate > 0.0) {
        return None;
    }

    let period = 60.0 * frame_rate / tempo;
    let localscore = local_score(onset, period)?;
    let (cumscore, backlink) = dynamic_program(&localscore, period, tightness);

    let last = last_beat(&cumscore)?;
    let mut beats = vec![last];
    let mut cursor = last;
    while let Some(prev) = backlink[cursor] {
        beats.push(prev);
        cursor = prev;
    }
    beats.reverse();

    let beats = trim_weak_beats(&beats, &localscore);
    trace!("Tracked {} beats at {:.2} BPM", beats.len(), tempo);
    if beats.is_empty() {
        None
    } else {
        Some(beats)
    }
}

/// Onset envelope normalised by its standard deviation, smoothed with a
/// Gaussian whose width follows the beat period
fn local_score(onset: &[f32], period: f64) -> Option<Vec<f64>> {
    let n = onset.len() as f64;
    let mean = onset.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = onset.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std <= f64::EPSILON {
        return None;
    }

    let half = period.round().max(1.0) as isize;
    let kernel: Vec<f64> = (-half..=half)
        .map(|k| (-0.5 * (k as f64 * 32.0 / period).powi(2)).exp())
        .collect();

    let normed: Vec<f64> = onset.iter().map(|&v| v as f64 / std).collect();
    let len = normed.len() as isize;
    let score = (0..len)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + j as isize - half;
                    (idx >= 0 && idx < len).then(|| w * normed[idx as usize])
                })
                .sum()
        })
        .collect();
    Some(score)
}

fn dynamic_program(localscore: &[f64], period: f64, tightness: f64) -> (Vec<f64>, Vec<Option<usize>>) {
    let n = localscore.len();
    let mut cumscore = vec![0.0f64; n];
    let mut backlink: Vec<Option<usize>> = vec![None; n];

    let far = (2.0 * period).round() as usize;
    let near = ((period / 2.0).round() as usize).max(1);
    let max_local = localscore.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut first_beat = true;

    for i in 0..n {
        let mut best: Option<(usize, f64)> = None;
        if i >= near {
            let lo = i.saturating_sub(far);
            for j in lo..=(i - near) {
                let gap = (i - j) as f64;
                let penalty = -tightness * (gap / period).ln().powi(2);
                let candidate = cumscore[j] + penalty;
                if best.map_or(true, |(_, s)| candidate > s) {
                    best = Some((j, candidate));
                }
            }
        }

        cumscore[i] = localscore[i] + best.map_or(0.0, |(_, s)| s);

        if first_beat && localscore[i] < 0.01 * max_local {
            backlink[i] = None;
        } else {
            backlink[i] = best.map(|(j, _)| j);
            first_beat = false;
        }
    }

    (cumscore, backlink)
}

/// Last local maximum of the cumulative score above half the median maximum
fn last_beat(cumscore: &[f64]) -> Option<usize> {
    let n = cumscore.len();
    let is_max = |i: usize| {
        let left = i == 0 || cumscore[i] > cumscore[i - 1];
        let right = i + 1 == n || cumscore[i] >= cumscore[i + 1];
        left && right
    };

    let mut maxima: Vec<f64> = (0..n).filter(|&i| is_max(i)).map(|i| cumscore[i]).collect();
    if maxima.is_empty() {
        return None;
    }
    maxima.sort_by(|a, b| a.total_cmp(b));
    let median = maxima[maxima.len() / 2];
    let threshold = 0.5 * median;

    (0..n).rev().find(|&i| is_max(i) && cumscore[i] > threshold)
}

/// Drop leading and trailing beats whose local score is below half the RMS
fn trim_weak_beats(beats: &[usize], localscore: &[f64]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let rms = (beats.iter().map(|&b| localscore[b].powi(2)).sum::<f64>() / beats.len() as f64).sqrt();
    let threshold = 0.5 * rms;

    let start = beats.iter().position(|&b| localscore[b] > threshold);
    let end = beats.iter().rposition(|&b| localscore[b] > threshold);
    match (start, end) {
        (Some(s), Some(e)) => beats[s..=e].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_train(period: usize, len: usize, offset: usize) -> Vec<f32> {
        (0..len)
            .map(|i| if i >= offset && (i - offset) % period == 0 { 1.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn test_beats_land_on_pulses() {
        // 100 frames/s, 120 BPM = one pulse every 50 frames
        let env = pulse_train(50, 2000, 7);
        let track = beat_track(&env, 100.0).unwrap();
        assert!((track.tempo - 120.0).abs() < 1.0);
        assert!(track.beats.len() >= 30, "only {} beats", track.beats.len());
        for &b in &track.beats {
            let phase = (b + 50 - 7) % 50;
            assert!(phase <= 1 || phase >= 49, "beat {} off grid", b);
        }
    }

    #[test]
    fn test_beats_strictly_increase() {
        let env = pulse_train(43, 3000, 0);
        let track = beat_track(&env, 100.0).unwrap();
        assert!(track.beats.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_silence_has_no_beats() {
        assert!(beat_track(&vec![0.0; 1000], 100.0).is_none());
    }

    #[test]
    fn test_times_use_frame_rate() {
        let track = BeatTrack {
            tempo: 120.0,
            beats: vec![0, 50, 100],
        };
        assert_eq!(track.times(100.0), vec![0.0, 0.5, 1.0]);
    }
}
