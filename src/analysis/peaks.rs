//! Peak picking on frame-rate curves

/// Parameters for [`pick_peaks`]
#[derive(Debug, Clone, Copy)]
pub struct PeakPickConfig {
    /// Frames before `n` that `x[n]` must be the maximum of
    pub pre_max: usize,
    /// Frames after `n` that `x[n]` must be the maximum of
    pub post_max: usize,
    /// Frames before `n` in the local mean
    pub pre_avg: usize,
    /// Frames after `n` in the local mean
    pub post_avg: usize,
    /// Minimum height above the local mean
    pub delta: f32,
    /// Minimum frames between accepted peaks
    pub wait: usize,
}

impl Default for PeakPickConfig {
    fn default() -> Self {
        Self {
            pre_max: 30,
            post_max: 30,
            pre_avg: 30,
            post_avg: 30,
            delta: 0.1,
            wait: 30,
        }
    }
}

/// Windowed peak picking
///
/// Frame `n` is a peak when it is the maximum of
/// `x[n - pre_max ..= n + post_max]`, exceeds the mean of
/// `x[n - pre_avg ..= n + post_avg]` by at least `delta`, and comes more than
/// `wait` frames after the previous accepted peak. Windows are truncated at
/// the signal edges.
pub fn pick_peaks(x: &[f32], config: &PeakPickConfig) -> Vec<usize> {
    let n = x.len();
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 0..n {
        let max_lo = i.saturating_sub(config.pre_max);
        let max_hi = (i + config.post_max + 1).min(n);
        let local_max = x[max_lo..max_hi].iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if x[i] < local_max {
            continue;
        }

        let avg_lo = i.saturating_sub(config.pre_avg);
        let avg_hi = (i + config.post_avg + 1).min(n);
        let window = &x[avg_lo..avg_hi];
        let local_mean = window.iter().sum::<f32>() / window.len() as f32;
        if x[i] < local_mean + config.delta {
            continue;
        }

        if let Some(prev) = last {
            if i - prev <= config.wait {
                continue;
            }
        }

        peaks.push(i);
        last = Some(i);
    }

    peaks
}

/// Local maxima at least `min_height` high and `min_distance` apart
///
/// When two maxima are too close the higher one wins. Returned indices are
/// in ascending order.
pub fn find_peaks(signal: &[f32], min_distance: usize, min_height: f32) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }

    let mut candidates: Vec<usize> = (1..signal.len() - 1)
        .filter(|&i| {
            signal[i] >= min_height && signal[i] > signal[i - 1] && signal[i] >= signal[i + 1]
        })
        .collect();

    candidates.sort_by(|&a, &b| signal[b].total_cmp(&signal[a]).then(a.cmp(&b)));

    let mut accepted: Vec<usize> = Vec::new();
    for idx in candidates {
        if accepted.iter().all(|&p| p.abs_diff(idx) >= min_distance) {
            accepted.push(idx);
        }
    }

    accepted.sort_unstable();
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_peaks_min_distance_keeps_highest() {
        let signal = vec![0.0, 0.5, 1.0, 0.7, 0.3, 0.9, 0.2, 0.0, 0.8, 0.1];
        assert_eq!(find_peaks(&signal, 2, 0.0), vec![2, 5, 8]);
        assert_eq!(find_peaks(&signal, 4, 0.0), vec![2, 8]);
        assert_eq!(find_peaks(&signal, 1, 0.85), vec![2, 5]);
    }

    #[test]
    fn test_find_peaks_short_signal() {
        assert!(find_peaks(&[1.0, 0.0], 1, 0.0).is_empty());
    }

    #[test]
    fn test_pick_peaks_respects_wait() {
        let mut x = vec![0.0f32; 200];
        x[10] = 1.0;
        x[25] = 1.0;
        x[100] = 1.0;
        let config = PeakPickConfig {
            pre_max: 5,
            post_max: 5,
            pre_avg: 5,
            post_avg: 5,
            delta: 0.1,
            wait: 30,
        };
        assert_eq!(pick_peaks(&x, &config), vec![10, 100]);
    }

    #[test]
    fn test_pick_peaks_flat_signal_has_none() {
        assert!(pick_peaks(&[0.3; 100], &PeakPickConfig::default()).is_empty());
    }
}
