//! Bar grid and bar-exact segmentation
//!
//! `samples_per_bar` is rounded once, and every boundary is an integer
//! multiple of it (plus an optional start offset). Boundaries therefore never
//! drift, and two stems of equal length cut with the same grid get identical
//! boundaries.

use crate::error::{Result, StemgridError};
use crate::types::Waveform;
use serde::Serialize;

/// Beats in one bar
pub const BEATS_PER_BAR: u32 = 4;

/// Highest sample rate a segment length is checked against
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Sample geometry of a tempo at a sample rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarGrid {
    pub bpm: f64,
    pub sample_rate: u32,
    pub beats_per_bar: u32,
    /// Unrounded samples per beat
    pub samples_per_beat: f64,
    /// `round(samples_per_beat * beats_per_bar)`
    pub samples_per_bar: usize,
}

impl BarGrid {
    pub fn new(bpm: f64, sample_rate: u32) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(StemgridError::segmentation(format!("bpm must be positive, got {}", bpm)));
        }
        if sample_rate == 0 {
            return Err(StemgridError::segmentation("sample rate must be positive"));
        }

        let samples_per_beat = 60.0 / bpm * sample_rate as f64;
        let bar = (samples_per_beat * BEATS_PER_BAR as f64).round();
        if !bar.is_finite() || bar >= usize::MAX as f64 {
            return Err(StemgridError::segmentation(format!(
                "bpm {} is too slow for {} Hz: a bar would not fit in memory",
                bpm, sample_rate
            )));
        }
        let samples_per_bar = bar as usize;
        if samples_per_bar == 0 {
            return Err(StemgridError::segmentation(format!(
                "bpm {} is too fast for {} Hz: a bar would be empty",
                bpm, sample_rate
            )));
        }

        Ok(Self {
            bpm,
            sample_rate,
            beats_per_bar: BEATS_PER_BAR,
            samples_per_beat,
            samples_per_bar,
        })
    }

    /// Nearest sample to a time in seconds (negative times clamp to 0)
    pub fn seconds_to_samples(&self, seconds: f64) -> usize {
        (seconds.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

/// Sample span of one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentBounds {
    pub index: usize,
    /// 1-based bar number the segment starts on
    pub start_bar: usize,
    pub start_sample: usize,
    /// Exclusive
    pub end_sample: usize,
}

/// One segment with its audio, in the source's format
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<T = f32> {
    pub bounds: SegmentBounds,
    pub waveform: Waveform<T>,
}

/// Cuts waveforms into consecutive blocks of N bars
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarSegmenter {
    bpm: f64,
    bars_per_segment: usize,
    offset_samples: usize,
}

impl BarSegmenter {
    pub fn new(bpm: f64, bars_per_segment: usize) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(StemgridError::segmentation(format!("bpm must be positive, got {}", bpm)));
        }
        if bars_per_segment == 0 {
            return Err(StemgridError::segmentation("bars per segment must be positive"));
        }
        let segmenter = Self {
            bpm,
            bars_per_segment,
            offset_samples: 0,
        };
        segmenter.samples_per_segment(MAX_SAMPLE_RATE)?;
        Ok(segmenter)
    }

    /// Start the grid `offset` samples into the waveform; labels still start at bar 1
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset_samples = offset;
        self
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn bars_per_segment(&self) -> usize {
        self.bars_per_segment
    }

    pub fn offset(&self) -> usize {
        self.offset_samples
    }

    pub fn grid(&self, sample_rate: u32) -> Result<BarGrid> {
        BarGrid::new(self.bpm, sample_rate)
    }

    pub fn samples_per_segment(&self, sample_rate: u32) -> Result<usize> {
        self.grid(sample_rate)?
            .samples_per_bar
            .checked_mul(self.bars_per_segment)
            .ok_or_else(|| {
                StemgridError::segmentation(format!(
                    "{} bars at {} BPM overflow the sample count",
                    self.bars_per_segment, self.bpm
                ))
            })
    }

    /// Segment spans for a waveform of `len` samples; a trailing partial
    /// segment is dropped
    pub fn bounds(&self, len: usize, sample_rate: u32) -> Result<Vec<SegmentBounds>> {
        let per_segment = self.samples_per_segment(sample_rate)?;
        let usable = len.saturating_sub(self.offset_samples);
        let count = usable / per_segment;

        Ok((0..count)
            .map(|i| {
                let start = self.offset_samples + i * per_segment;
                SegmentBounds {
                    index: i,
                    start_bar: i * self.bars_per_segment + 1,
                    start_sample: start,
                    end_sample: start + per_segment,
                }
            })
            .collect())
    }

    /// Slice a waveform into segments carrying the same format
    pub fn segments<T: Copy>(&self, waveform: &Waveform<T>) -> Result<Vec<Segment<T>>> {
        Ok(self
            .bounds(waveform.len(), waveform.sample_rate)?
            .into_iter()
            .map(|bounds| Segment {
                bounds,
                waveform: waveform.slice(bounds.start_sample, bounds.end_sample),
            })
            .collect())
    }
}
