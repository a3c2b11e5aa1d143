//! Chopping stems into bar-exact segment files

use super::orchestrator::PipelineResult;
use crate::analysis::{classify, DownbeatDetector, FeatureExtractor};
use crate::audio::{self, read_wav};
use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{Result, StemgridError};
use crate::naming::parse_bpm;
use crate::segment::{write_segments, BarSegmenter};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// How a set of stems is cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChopOptions {
    pub bpm: f64,
    pub bars_per_segment: usize,
    /// First segment starts here instead of at 0; converted at each stem's rate
    pub offset_seconds: f64,
}

impl ChopOptions {
    pub fn new(bpm: f64, bars_per_segment: usize) -> Self {
        Self {
            bpm,
            bars_per_segment,
            offset_seconds: 0.0,
        }
    }

    pub fn with_offset_seconds(mut self, offset_seconds: f64) -> Self {
        self.offset_seconds = offset_seconds.max(0.0);
        self
    }
}

/// Outcome of chopping a set of stems
#[derive(Debug, Default)]
pub struct ChopReport {
    /// Stems that were chopped and how many segments each produced
    pub files: Vec<(PathBuf, usize)>,
    /// Stems left alone because their sample rate differs from the first stem
    pub skipped: Vec<PathBuf>,
    /// Stems that could not be read or written
    pub failed: Vec<PathBuf>,
    /// Total segment files written
    pub total: usize,
}

/// Chop the stems of one track into `out_dir`
///
/// The first readable stem fixes the reference sample rate. Stems at another
/// rate are skipped, never resampled, so every written segment of the set
/// shares the same sample boundaries. A failing stem does not stop the rest.
pub fn chop_stem_files(files: &[PathBuf], options: &ChopOptions, out_dir: &Path) -> Result<ChopReport> {
    // Parameter errors are the same for every stem; surface them once
    let segmenter = BarSegmenter::new(options.bpm, options.bars_per_segment)?;

    let mut report = ChopReport::default();
    let mut reference_rate: Option<u32> = None;

    for path in files {
        let audio = match read_wav(path) {
            Ok(audio) => audio,
            Err(e) => {
                error!("Cannot read stem {}: {}", path.display(), e);
                report.failed.push(path.clone());
                continue;
            }
        };

        let rate = audio.sample_rate();
        let reference = *reference_rate.get_or_insert(rate);
        if rate != reference {
            warn!(
                "Skipping {}: sample rate {} Hz differs from {} Hz",
                path.display(),
                rate,
                reference
            );
            report.skipped.push(path.clone());
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            error!("Skipping {}: file name is not valid UTF-8", path.display());
            report.failed.push(path.clone());
            continue;
        };

        let offset = segmenter.grid(rate)?.seconds_to_samples(options.offset_seconds);
        let stem_segmenter = segmenter.with_offset(offset);

        match write_segments(&audio, &stem_segmenter, out_dir, file_name) {
            Ok(written) => {
                debug!("{}: {} segments", file_name, written.len());
                report.total += written.len();
                report.files.push((path.clone(), written.len()));
            }
            Err(e) => {
                error!("Failed to chop {}: {}", path.display(), e);
                report.failed.push(path.clone());
            }
        }
    }

    info!(
        "Wrote {} segments from {} stems into {}",
        report.total,
        report.files.len(),
        out_dir.display()
    );

    Ok(report)
}

/// BPM for segment-only mode: the override, else the first file name carrying one
pub fn resolve_segment_bpm(bpm_override: Option<f64>, files: &[DiscoveredFile]) -> Result<f64> {
    if let Some(bpm) = bpm_override {
        return Ok(bpm);
    }

    files
        .iter()
        .find_map(|f| {
            f.path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_bpm)
        })
        .ok_or_else(|| {
            StemgridError::ConfigError(
                "no BPM given and none found in the stem file names (expected e.g. 128.00BPM); use --bpm"
                    .to_string(),
            )
        })
}

/// First downbeat of a stem, for aligning segments in segment-only mode
fn first_downbeat(path: &Path) -> Result<Option<f64>> {
    let buffer = audio::decode(path)?;
    let features = FeatureExtractor::new().extract_buffer(&buffer)?;
    let music_type = classify(&features);
    let downbeats =
        DownbeatDetector::new().detect(&buffer.samples, buffer.sample_rate, &features, music_type);
    Ok(downbeats.first())
}

/// Chop existing stem WAVs found at the input path into `<output>/segments`
pub fn run_segment_only(settings: &Settings) -> Result<PipelineResult> {
    info!("Scanning for stems to chop...");
    let files = discovery::scan_wavs(&settings.input, settings.recursive)?;

    if files.is_empty() {
        return Ok(PipelineResult::default());
    }

    let bpm = resolve_segment_bpm(settings.bpm_override, &files)?;
    let out_dir = settings.output.join("segments");

    if settings.dry_run {
        println!();
        println!("=== DRY RUN MODE ===");
        println!();
        println!(
            "Would chop {} stems at {:.2} BPM into {}-bar segments:",
            files.len(),
            bpm,
            settings.bars_per_segment
        );
        for file in &files {
            println!("  {}", file.path.display());
        }
        println!();
        println!("Would create:");
        println!("  {}/B<bar>_<stem>.wav", out_dir.display());
        println!();
        return Ok(PipelineResult {
            total_files: files.len(),
            skipped: files.len(),
            ..PipelineResult::default()
        });
    }

    let mut options = ChopOptions::new(bpm, settings.bars_per_segment);
    if settings.align_downbeat {
        match first_downbeat(&files[0].path) {
            Ok(Some(t)) => {
                info!("Aligning segments to downbeat at {:.3}s", t);
                options = options.with_offset_seconds(t);
            }
            Ok(None) => warn!("No downbeat found, segments start at 0"),
            Err(e) => warn!("Downbeat detection failed, segments start at 0: {}", e),
        }
    }

    let paths: Vec<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
    let report = chop_stem_files(&paths, &options, &out_dir)?;

    Ok(PipelineResult {
        total_files: files.len(),
        successful: report.files.len(),
        failed: report.failed.len(),
        skipped: report.skipped.len(),
    })
}
