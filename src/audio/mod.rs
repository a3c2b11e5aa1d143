//! Audio input and output

pub mod decoder;
pub mod wav;

pub use decoder::{decode, resample, ANALYSIS_SAMPLE_RATE};
pub use wav::{read_wav, write_wav, StemAudio};
