//! Batch processing: analysis, stems, chopping and export

pub mod chop;
pub mod orchestrator;
pub mod progress;

pub use chop::{chop_stem_files, resolve_segment_bpm, run_segment_only, ChopOptions, ChopReport};
pub use orchestrator::{run, PipelineResult};
pub use progress::{ProgressEvent, ProgressListener, ProgressTally, Stage};
