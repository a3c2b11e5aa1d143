//! Tempo estimation
//!
//! A primary predictor (normally an ML model) is tried first. Any error or
//! an unusable bpm from it routes to the onset autocorrelation fallback,
//! which reports no confidence.

pub mod autocorr;
pub mod predictor;

pub use autocorr::{autocorrelate, AutocorrelationTempo};
pub use predictor::{CommandTempoPredictor, UnavailableTempoPredictor};

use crate::analysis::features::FeatureExtractor;
use crate::analysis::traits::TempoPredictor;
use crate::error::{Result, StemgridError};
use crate::types::{AudioBuffer, FeatureSet, TempoEstimate, TempoSource};
use std::sync::Arc;
use tracing::{debug, warn};

/// Round to two decimals
pub fn round_bpm(bpm: f64) -> f64 {
    (bpm * 100.0).round() / 100.0
}

/// Combines a primary predictor with the autocorrelation fallback
#[derive(Clone)]
pub struct TempoEstimator {
    predictor: Arc<dyn TempoPredictor>,
    fallback: AutocorrelationTempo,
}

impl TempoEstimator {
    pub fn new(predictor: Arc<dyn TempoPredictor>) -> Self {
        Self {
            predictor,
            fallback: AutocorrelationTempo::default(),
        }
    }

    /// Estimator that always uses the fallback
    pub fn fallback_only() -> Self {
        Self::new(Arc::new(UnavailableTempoPredictor))
    }

    pub fn predictor_name(&self) -> &'static str {
        self.predictor.name()
    }

    /// Estimate tempo, computing the onset envelope only if the fallback needs it
    pub fn estimate(&self, buffer: &AudioBuffer) -> Result<TempoEstimate> {
        if let Some(estimate) = self.try_primary(buffer)? {
            return Ok(estimate);
        }
        let features = FeatureExtractor::new().extract_buffer(buffer)?;
        self.from_features(&features)
    }

    /// Estimate tempo reusing already extracted features for the fallback
    pub fn estimate_with_features(
        &self,
        buffer: &AudioBuffer,
        features: &FeatureSet,
    ) -> Result<TempoEstimate> {
        if let Some(estimate) = self.try_primary(buffer)? {
            return Ok(estimate);
        }
        self.from_features(features)
    }

    fn try_primary(&self, buffer: &AudioBuffer) -> Result<Option<TempoEstimate>> {
        if buffer.is_empty() || buffer.sample_rate == 0 {
            return Err(StemgridError::analysis("cannot estimate tempo of an empty waveform"));
        }

        match self.predictor.predict(buffer) {
            Ok((bpm, confidence)) if bpm.is_finite() && bpm > 0.0 => {
                let bpm = round_bpm(bpm);
                if bpm <= 0.0 {
                    warn!("{} returned a bpm that rounds to zero", self.predictor.name());
                    return Ok(None);
                }
                let confidence = confidence.is_finite().then(|| confidence.clamp(0.0, 1.0));
                debug!("{} predicted {:.2} BPM", self.predictor.name(), bpm);
                Ok(Some(TempoEstimate {
                    bpm,
                    confidence,
                    source: TempoSource::Ml,
                }))
            }
            Ok((bpm, _)) => {
                warn!("{} returned invalid bpm {}", self.predictor.name(), bpm);
                Ok(None)
            }
            Err(e) => {
                debug!("{} failed, using fallback: {}", self.predictor.name(), e);
                Ok(None)
            }
        }
    }

    fn from_features(&self, features: &FeatureSet) -> Result<TempoEstimate> {
        let bpm = self
            .fallback
            .estimate(&features.onset_envelope, features.frame_rate())?;
        let bpm = round_bpm(bpm);
        if !(bpm > 0.0) {
            return Err(StemgridError::TempoDetectionError {
                reason: format!("fallback produced unusable bpm {}", bpm),
            });
        }

        Ok(TempoEstimate {
            bpm,
            confidence: None,
            source: TempoSource::Fallback,
        })
    }
}

/// A user supplied tempo, bypassing detection
pub fn manual_tempo(bpm: f64) -> Result<TempoEstimate> {
    if !bpm.is_finite() || bpm <= 0.0 {
        return Err(StemgridError::ConfigError(format!(
            "BPM override must be a positive number, got {}",
            bpm
        )));
    }
    Ok(TempoEstimate {
        bpm: round_bpm(bpm),
        confidence: None,
        source: TempoSource::Manual,
    })
}
