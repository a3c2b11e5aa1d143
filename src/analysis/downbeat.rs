//! Downbeat and phrase start detection
//!
//! Two strategies, selected by music type:
//! - ambient: peaks in the harmonic change of the tonal centroid
//! - rhythmic: kick onsets found near a 4-beat phrase grid
//!
//! Detection never fails. The worst case is an empty [`DownbeatSet`].

use super::beat::beat_track;
use super::chroma::{chroma, harmonic_change, tonnetz, CHROMA_MAX_HZ, CHROMA_MIN_HZ};
use super::hpss::{hpss, HpssConfig};
use super::onset::band_onset;
use super::peaks::{find_peaks, pick_peaks, PeakPickConfig};
use super::stft::{stft, Spectrogram, N_FFT};
use crate::types::{DownbeatSet, FeatureSet, MusicType};
use tracing::debug;

/// Kick drum band in Hz
pub const KICK_BAND_HZ: (f32, f32) = (20.0, 150.0);

/// Search window around each expected phrase boundary, seconds
pub const PHRASE_TOLERANCE_SECS: f64 = 0.1;

/// Beats per phrase
pub const BEATS_PER_PHRASE: usize = 4;

#[derive(Debug, Clone)]
pub struct DownbeatDetector {
    ambient_hpss: HpssConfig,
    rhythmic_hpss: HpssConfig,
    peak_pick: PeakPickConfig,
    tolerance: f64,
}

impl Default for DownbeatDetector {
    fn default() -> Self {
        Self {
            ambient_hpss: HpssConfig::default(),
            rhythmic_hpss: HpssConfig::percussive_focus(),
            peak_pick: PeakPickConfig::default(),
            tolerance: PHRASE_TOLERANCE_SECS,
        }
    }
}

impl DownbeatDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Downbeat times in seconds for mono `samples`
    pub fn detect(
        &self,
        samples: &[f32],
        sample_rate: u32,
        features: &FeatureSet,
        music_type: MusicType,
    ) -> DownbeatSet {
        if samples.is_empty() || sample_rate == 0 || features.hop_length == 0 {
            return DownbeatSet::default();
        }

        let spec = stft(samples, sample_rate, N_FFT, features.hop_length);
        let duration = samples.len() as f64 / sample_rate as f64;

        let downbeats = if music_type.is_rhythmic() {
            self.detect_rhythmic(&spec, features, duration)
        } else {
            self.detect_ambient(&spec, features.frame_rate())
        };

        debug!(
            "Detected {} downbeats ({} strategy)",
            downbeats.len(),
            if music_type.is_rhythmic() { "rhythmic" } else { "ambient" }
        );
        downbeats
    }

    fn detect_ambient(&self, spec: &Spectrogram, frame_rate: f64) -> DownbeatSet {
        let bins = spec.bin_range(CHROMA_MIN_HZ, CHROMA_MAX_HZ);
        let harmonic = hpss(spec, bins, &self.ambient_hpss).harmonic;

        let mut change = harmonic_change(&tonnetz(&chroma(&harmonic)));
        let max = change.iter().copied().fold(0.0f32, f32::max);
        if max <= 0.0 {
            return DownbeatSet::default();
        }
        change.iter_mut().for_each(|v| *v /= max);

        let frames = pick_peaks(&change, &self.peak_pick);
        DownbeatSet::from_times(frames.into_iter().map(|f| f as f64 / frame_rate))
    }

    fn detect_rhythmic(&self, spec: &Spectrogram, features: &FeatureSet, duration: f64) -> DownbeatSet {
        let frame_rate = features.frame_rate();

        let Some(track) = beat_track(&features.onset_envelope, frame_rate) else {
            debug!("No beat grid; returning no downbeats");
            return DownbeatSet::default();
        };

        let beat_duration = 60.0 / track.tempo;
        let phrase_duration = BEATS_PER_PHRASE as f64 * beat_duration;

        let (low, high) = KICK_BAND_HZ;
        let percussive = hpss(spec, spec.bin_range(low, high), &self.rhythmic_hpss).percussive;
        let kick_onset = band_onset(&percussive, low, high);

        let min_distance = ((beat_duration / 4.0) * frame_rate).round().max(1.0) as usize;
        let kick_times: Vec<f64> = find_peaks(&kick_onset, min_distance, f32::EPSILON)
            .into_iter()
            .map(|f| f as f64 / frame_rate)
            .collect();

        let starts = phrase_starts_from_kicks(&kick_times, phrase_duration, duration, self.tolerance);
        if !starts.is_empty() {
            return DownbeatSet::from_times(starts);
        }

        debug!("No kick-aligned phrase starts; using every {}th beat", BEATS_PER_PHRASE);
        let beat_times = track.times(frame_rate);
        DownbeatSet::from_times(beat_times.into_iter().step_by(BEATS_PER_PHRASE))
    }
}

/// Walk a phrase grid from 0 to `duration`; at each step take the earliest
/// kick within `tolerance` of the expected boundary
///
/// Steps without a nearby kick contribute nothing. `kick_times` must be
/// ascending.
pub fn phrase_starts_from_kicks(
    kick_times: &[f64],
    phrase_duration: f64,
    duration: f64,
    tolerance: f64,
) -> Vec<f64> {
    if !(phrase_duration > 0.0) || !(duration > 0.0) {
        return Vec::new();
    }

    let steps = (duration / phrase_duration).ceil() as usize;
    let mut starts = Vec::new();

    for step in 0..steps {
        let expected = step as f64 * phrase_duration;
        if expected >= duration {
            break;
        }
        let earliest = kick_times
            .iter()
            .copied()
            .find(|&k| k >= expected - tolerance && k <= expected + tolerance);
        if let Some(kick) = earliest {
            if starts.last().map_or(true, |&last| kick > last) {
                starts.push(kick);
            }
        }
    }

    starts
}
