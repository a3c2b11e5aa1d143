//! stemgrid - tempo, downbeat and bar-exact segmentation toolkit for DJs
//!
//! A command-line utility and library that analyses tracks for BPM, key,
//! music type and downbeats, optionally separates stems and drum parts with
//! external models, and chops stems into sample-exact N-bar segments.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `discovery`: File scanning and track ID generation
//! - `audio`: Decoding (symphonia), resampling (rubato) and WAV stem I/O (hound)
//! - `analysis`: Features, tempo, music type, downbeats, key and stem adapters
//! - `segment`: Bar grid and segment writing
//! - `pipeline`: Parallel processing orchestration
//! - `export`: JSON report
//!
//! # Example
//!
//! ```no_run
//! use stemgrid::{config::Settings, pipeline};
//!
//! let settings = Settings::default();
//! let result = pipeline::run(&settings).expect("Analysis failed");
//! println!("Processed {} tracks", result.successful);
//! ```

pub mod analysis;
pub mod audio;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod naming;
pub mod pipeline;
pub mod segment;
pub mod types;

// Re-export key types at crate root
pub use error::{Result, StemgridError};
pub use types::{
    AnalyzedTrack, AudioBuffer, DownbeatSet, FeatureSet, MusicType, TempoEstimate, TempoSource,
    Waveform,
};
