//! Bar-exact segmentation of stems

pub mod grid;
pub mod writer;

pub use grid::{BarGrid, BarSegmenter, Segment, SegmentBounds, BEATS_PER_BAR};
pub use writer::write_segments;
