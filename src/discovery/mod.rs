//! Input discovery

pub mod scanner;

pub use scanner::{base_name, generate_track_id, scan, scan_wavs, DiscoveredFile};
