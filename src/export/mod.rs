//! Analysis report export

pub mod json;

pub use json::{read_existing_analysis, read_existing_tracks, write_json, REPORT_FILE_NAME};
