//! Audio analysis
//!
//! DSP stages (features, tempo, classification, downbeats) plus the trait
//! seams to external collaborators (ML tempo model, key detector,
//! separators).

pub mod beat;
pub mod chroma;
pub mod classifier;
pub mod downbeat;
pub mod features;
pub mod hpss;
pub mod key;
pub mod onset;
pub mod peaks;
pub mod stems;
pub mod stft;
pub mod tempo;
pub mod traits;

pub use traits::{DrumSeparator, KeyDetector, StemSeparator, TempoPredictor};

pub use classifier::{classify, FeatureStats};
pub use downbeat::DownbeatDetector;
pub use features::FeatureExtractor;
pub use key::{CommandKeyDetector, NoKeyDetector};
pub use stems::{DemucsSeparator, DrumsepSeparator, UnavailableDrumSeparator, UnavailableStemSeparator};
pub use tempo::{CommandTempoPredictor, TempoEstimator, UnavailableTempoPredictor};
