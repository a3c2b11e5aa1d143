//! Music type classification
//!
//! An ordered rule table over aggregate feature statistics. Rules are
//! evaluated top to bottom and the first match wins; `Balanced` is the
//! catch-all when nothing matches.

use crate::types::{Band, FeatureSet, MusicType};
use serde::Serialize;

/// Mean onset strength below which a track is considered ambient
pub const AMBIENT_RHYTHM_THRESHOLD: f64 = 0.1;

/// Aggregate statistics the rules look at
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureStats {
    pub rhythm_strength: f64,
    pub bass_presence: f64,
    pub high_freq_content: f64,
    pub overall_mean: f64,
}

fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

impl FeatureStats {
    pub fn from_features(features: &FeatureSet) -> Self {
        let band_means: Vec<f64> = Band::ALL.iter().map(|&b| mean(features.band(b))).collect();
        Self {
            rhythm_strength: mean(&features.onset_envelope),
            bass_presence: mean(features.band(Band::Bass)),
            high_freq_content: mean(features.band(Band::High)),
            overall_mean: band_means.iter().sum::<f64>() / band_means.len() as f64,
        }
    }
}

/// One row of the rule table
pub struct ClassificationRule {
    pub name: &'static str,
    pub matches: fn(&FeatureStats) -> bool,
    pub music_type: MusicType,
}

/// Rules in priority order
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        name: "weak rhythm",
        matches: |s| s.rhythm_strength < AMBIENT_RHYTHM_THRESHOLD,
        music_type: MusicType::Ambient,
    },
    ClassificationRule {
        name: "bass above average",
        matches: |s| s.bass_presence > s.overall_mean,
        music_type: MusicType::BassHeavy,
    },
    ClassificationRule {
        name: "highs above average",
        matches: |s| s.high_freq_content > s.overall_mean,
        music_type: MusicType::Bright,
    },
];

/// First rule that matches, `None` for the catch-all
pub fn matching_rule(stats: &FeatureStats) -> Option<&'static ClassificationRule> {
    RULES.iter().find(|rule| (rule.matches)(stats))
}

/// Classify from precomputed statistics
pub fn classify_stats(stats: &FeatureStats) -> MusicType {
    matching_rule(stats)
        .map(|rule| rule.music_type)
        .unwrap_or(MusicType::Balanced)
}

/// Classify a track from its features
pub fn classify(features: &FeatureSet) -> MusicType {
    let stats = FeatureStats::from_features(features);
    let rule = matching_rule(&stats);
    let music_type = rule.map_or(MusicType::Balanced, |r| r.music_type);
    tracing::debug!(
        "Classified as {} by {} (rhythm {:.3}, bass {:.1} dB, high {:.1} dB, mean {:.1} dB)",
        music_type,
        rule.map_or("no rule", |r| r.name),
        stats.rhythm_strength,
        stats.bass_presence,
        stats.high_freq_content,
        stats.overall_mean
    );
    music_type
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn features(onset: f32, levels: [f32; 6]) -> FeatureSet {
        let band_energies: BTreeMap<Band, Vec<f32>> = Band::ALL
            .iter()
            .zip(levels)
            .map(|(&b, level)| (b, vec![level; 10]))
            .collect();
        FeatureSet {
            onset_envelope: vec![onset; 10],
            tempogram: vec![vec![0.0; 10]; 4],
            band_energies,
            sample_rate: 22050,
            hop_length: 512,
        }
    }

    #[test]
    fn test_weak_rhythm_wins_over_extreme_bands() {
        let f = features(0.05, [-80.0, 0.0, -80.0, -80.0, -80.0, 0.0]);
        assert_eq!(classify(&f), MusicType::Ambient);
    }

    #[test]
    fn test_bass_heavy() {
        let f = features(1.0, [-40.0, -10.0, -40.0, -40.0, -40.0, -50.0]);
        assert_eq!(classify(&f), MusicType::BassHeavy);
    }

    #[test]
    fn test_bass_checked_before_highs() {
        let f = features(1.0, [-60.0, -10.0, -60.0, -60.0, -60.0, -5.0]);
        assert_eq!(classify(&f), MusicType::BassHeavy);
    }

    #[test]
    fn test_bright() {
        let f = features(1.0, [-40.0, -50.0, -40.0, -40.0, -40.0, -10.0]);
        assert_eq!(classify(&f), MusicType::Bright);
    }

    #[test]
    fn test_balanced_when_flat() {
        let f = features(1.0, [-30.0; 6]);
        assert_eq!(classify(&f), MusicType::Balanced);
    }

    #[test]
    fn test_threshold_is_strict() {
        let stats = FeatureStats {
            rhythm_strength: AMBIENT_RHYTHM_THRESHOLD,
            bass_presence: -30.0,
            high_freq_content: -30.0,
            overall_mean: -30.0,
        };
        assert_eq!(classify_stats(&stats), MusicType::Balanced);
        assert!(matching_rule(&stats).is_none());
    }

    #[test]
    fn test_matching_rule_names_the_decision() {
        let f = features(1.0, [-60.0, -10.0, -60.0, -60.0, -60.0, -5.0]);
        let rule = matching_rule(&FeatureStats::from_features(&f)).unwrap();
        assert_eq!(rule.name, "bass above average");
        assert_eq!(rule.music_type, MusicType::BassHeavy);
    }

    #[test]
    fn test_empty_sequences_have_zero_mean() {
        let mut f = features(0.5, [-30.0; 6]);
        f.onset_envelope.clear();
        assert_eq!(FeatureStats::from_features(&f).rhythm_strength, 0.0);
    }
}
