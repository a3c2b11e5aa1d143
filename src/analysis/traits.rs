//! Analysis trait abstractions
//!
//! These traits are the seams to external collaborators (ML tempo model,
//! key detector, source separators). Each has a concrete subprocess adapter
//! and an "unavailable" implementation for tests and missing tools.

use crate::error::Result;
use crate::types::{AudioBuffer, DrumPaths, KeyCandidate, StemPaths};
use std::path::Path;

/// Primary (ML) tempo predictor
pub trait TempoPredictor: Send + Sync {
    /// Predict `(bpm, confidence)` for a mono analysis buffer
    fn predict(&self, buffer: &AudioBuffer) -> Result<(f64, f64)>;

    /// Get the name of this predictor (for logging)
    fn name(&self) -> &'static str;
}

/// Musical key detection backend
pub trait KeyDetector: Send + Sync {
    /// Ranked key candidates for an audio file, best first
    fn detect(&self, path: &Path) -> Result<Vec<KeyCandidate>>;

    /// Get the name of this detector (for logging)
    fn name(&self) -> &'static str;
}

/// Stem separation backend
pub trait StemSeparator: Send + Sync {
    /// Separate audio into stems (drums, bass, vocals, other)
    ///
    /// # Arguments
    /// * `input_path` - Path to the source audio file
    /// * `work_dir` - Scratch directory the tool may write into
    ///
    /// # Returns
    /// Paths to the generated stem files inside `work_dir`
    fn separate(&self, input_path: &Path, work_dir: &Path) -> Result<StemPaths>;

    /// Check if the separator can run at all
    fn is_available(&self) -> bool;

    /// Get the name of this separator (for logging)
    fn name(&self) -> &'static str;
}

/// Drum sub-separation backend
pub trait DrumSeparator: Send + Sync {
    /// Split a drum stem into kit components
    fn separate(&self, drum_stem: &Path, work_dir: &Path) -> Result<DrumPaths>;

    fn is_available(&self) -> bool;

    fn name(&self) -> &'static str;
}
