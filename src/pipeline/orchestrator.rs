//! Pipeline orchestration
//!
//! Coordinates file discovery, parallel analysis, and export.
//! Stem separation runs on a separate thread with bounded channel for backpressure.

use super::chop::{chop_stem_files, run_segment_only, ChopOptions};
use super::progress::{report, ProgressEvent, ProgressListener, Stage};
use crate::analysis::tempo::manual_tempo;
use crate::analysis::{
    classify, CommandKeyDetector, CommandTempoPredictor, DemucsSeparator, DownbeatDetector,
    DrumSeparator, DrumsepSeparator, FeatureExtractor, KeyDetector, NoKeyDetector, StemSeparator,
    TempoEstimator, TempoPredictor, UnavailableTempoPredictor,
};
use crate::analysis::key::camelot::candidate_from_camelot;
use crate::audio;
use crate::config::Settings;
use crate::discovery::{self, DiscoveredFile};
use crate::error::{Result, StemgridError};
use crate::export;
use crate::naming;
use crate::types::{AnalyzedTrack, DrumPaths, KeyCandidate, StemKind, StemPaths};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Minimum audio duration in seconds required for reliable analysis
const MIN_AUDIO_DURATION_SECS: f64 = 3.0;

/// Queued stem jobs before analysis threads block on send
const STEM_CHANNEL_CAPACITY: usize = 4;

/// Give up queueing a stem job after this long; the worker is likely dead
const STEM_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Pipeline result summary
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineResult {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Run the full pipeline, or only the chopping step in segment-only mode
pub fn run(settings: &Settings) -> Result<PipelineResult> {
    let pipeline_start = Instant::now();

    configure_thread_pool(settings.analysis_threads)?;

    if settings.segment_only {
        return run_segment_only(settings);
    }

    // Phase 1: Discovery
    let discovery_start = Instant::now();
    info!("Scanning for audio files...");
    let files = discovery::scan(&settings.input, settings.recursive)?;

    if files.is_empty() {
        return Ok(PipelineResult::default());
    }

    info!(
        "Found {} audio files in {:.2}s",
        files.len(),
        discovery_start.elapsed().as_secs_f64()
    );

    if settings.dry_run {
        return run_dry_run(&files, settings);
    }

    // Skip tracks already present in the report
    let json_path = settings.output.join(export::REPORT_FILE_NAME);
    let existing_paths = if settings.force || !settings.output_json {
        debug!("Re-analyzing all files");
        HashSet::new()
    } else {
        export::read_existing_analysis(&json_path)
    };

    let (files_to_analyze, skipped_existing): (Vec<_>, Vec<_>) =
        files.into_iter().partition(|f| {
            let path_str = f.path.to_string_lossy().to_string();
            if existing_paths.contains(&path_str) {
                debug!("Skipping {} (already analyzed)", f.path.display());
                false
            } else {
                true
            }
        });

    let skipped_existing_count = skipped_existing.len();
    if skipped_existing_count > 0 {
        info!(
            "Skipping {} already-analyzed files (use --force to re-analyze)",
            skipped_existing_count
        );
    }

    let total_files = files_to_analyze.len() + skipped_existing_count;

    if files_to_analyze.is_empty() {
        info!("All files already analyzed, nothing to do");
        return Ok(PipelineResult {
            total_files,
            skipped: skipped_existing_count,
            ..PipelineResult::default()
        });
    }

    info!("Analyzing {} files", files_to_analyze.len());

    // Phase 2: Analysis (and stems on the side)
    let analysis_start = Instant::now();
    let (tracks, stats) = analyze_files(&files_to_analyze, settings)?;
    let analysis_elapsed = analysis_start.elapsed().as_secs_f64();
    info!(
        "Analysis completed in {:.2}s ({:.1} tracks/sec)",
        analysis_elapsed,
        if analysis_elapsed > 0.0 {
            files_to_analyze.len() as f64 / analysis_elapsed
        } else {
            0.0
        }
    );

    // Phase 3: Export
    if !tracks.is_empty() && settings.output_json {
        export_results(&tracks, &json_path, settings)?;
    }

    info!(
        "Total pipeline time: {:.2}s",
        pipeline_start.elapsed().as_secs_f64()
    );

    Ok(PipelineResult {
        total_files,
        successful: stats.successful,
        failed: stats.failed,
        skipped: stats.skipped + skipped_existing_count,
    })
}

/// Dry run mode - show files that would be analyzed without processing
fn run_dry_run(files: &[DiscoveredFile], settings: &Settings) -> Result<PipelineResult> {
    use std::collections::BTreeMap;

    println!();
    println!("=== DRY RUN MODE ===");
    println!();

    let mut by_directory: BTreeMap<PathBuf, Vec<&DiscoveredFile>> = BTreeMap::new();
    for file in files {
        let dir = file.path.parent().unwrap_or(&file.path).to_path_buf();
        by_directory.entry(dir).or_default().push(file);
    }

    for (dir, dir_files) in &by_directory {
        println!("{}/ ({} files)", dir.display(), dir_files.len());
        for file in dir_files {
            let filename = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("?");
            println!("  {}", filename);
        }
        println!();
    }

    let mut by_format: BTreeMap<String, usize> = BTreeMap::new();
    for file in files {
        *by_format.entry(format!("{:?}", file.format).to_uppercase()).or_default() += 1;
    }

    println!("─────────────────────────────────────────");
    println!();
    println!("Would analyze {} files:", files.len());
    let mut formats: Vec<_> = by_format.iter().collect();
    formats.sort_by(|a, b| b.1.cmp(a.1));
    for (format, count) in formats {
        println!("  {} {} files", count, format);
    }
    println!();

    let out = settings.output.display();
    println!("Would create:");
    if settings.output_json {
        println!("  {}/{}", out, export::REPORT_FILE_NAME);
    }
    if settings.stems_enabled {
        println!("  {}/<track>/<key>_<bpm>BPM_<track>-<stem>.wav (4 stems per track)", out);
    }
    if settings.drums_enabled {
        println!("  {}/<track>/<key>_<bpm>BPM_<track>-drums-<part>.wav (4 parts per track)", out);
    }
    if settings.chop_enabled {
        println!(
            "  {}/<track>/segments/B<bar>_*.wav ({}-bar segments)",
            out, settings.bars_per_segment
        );
    }
    println!();

    Ok(PipelineResult {
        total_files: files.len(),
        skipped: files.len(), // All "skipped" in dry run mode
        ..PipelineResult::default()
    })
}

/// Configure the Rayon thread pool
fn configure_thread_pool(num_threads: usize) -> Result<()> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
    {
        Ok(()) => {
            debug!("Configured thread pool with {} threads", num_threads);
        }
        Err(e) => {
            // Already initialized (e.g. by an earlier run in the same process)
            if e.to_string().contains("already been initialized") {
                debug!("Thread pool already initialized, using existing pool");
            } else {
                return Err(StemgridError::ConfigError(format!(
                    "Failed to configure thread pool: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// Track analysis
// =============================================================================

/// Everything needed to analyze one track, shared across rayon workers
struct TrackAnalyzer {
    extractor: FeatureExtractor,
    tempo: TempoEstimator,
    downbeats: DownbeatDetector,
    key_detector: Arc<dyn KeyDetector>,
    bpm_override: Option<f64>,
    key_override: Option<KeyCandidate>,
}

impl TrackAnalyzer {
    fn from_settings(settings: &Settings) -> Self {
        let predictor: Arc<dyn TempoPredictor> = match settings
            .tempo_cmd
            .as_deref()
            .and_then(CommandTempoPredictor::from_command_line)
        {
            Some(p) => Arc::new(p),
            None => Arc::new(UnavailableTempoPredictor),
        };

        let key_detector: Arc<dyn KeyDetector> = match settings
            .key_cmd
            .as_deref()
            .and_then(CommandKeyDetector::from_command_line)
        {
            Some(d) => Arc::new(d),
            None => Arc::new(NoKeyDetector),
        };

        let tempo = TempoEstimator::new(predictor);
        info!(
            "Tempo: {} with autocorrelation fallback; key: {}",
            tempo.predictor_name(),
            key_detector.name()
        );

        Self {
            extractor: FeatureExtractor::new(),
            tempo,
            downbeats: DownbeatDetector::new(),
            key_detector,
            bpm_override: settings.bpm_override,
            key_override: settings.key_override.as_deref().and_then(candidate_from_camelot),
        }
    }

    fn analyze(&self, file: &DiscoveredFile) -> Result<AnalyzedTrack> {
        debug!("Analyzing: {}", file.path.display());

        let track_id = discovery::generate_track_id(&file.path);
        let buffer = audio::decode(&file.path)?;

        if buffer.duration < MIN_AUDIO_DURATION_SECS {
            return Err(StemgridError::analysis(format!(
                "audio too short ({:.1}s), at least {:.0}s needed for tempo and downbeat detection",
                buffer.duration, MIN_AUDIO_DURATION_SECS
            )));
        }

        let features = self.extractor.extract_buffer(&buffer)?;

        let tempo = match self.bpm_override {
            Some(bpm) => manual_tempo(bpm)?,
            None => self.tempo.estimate_with_features(&buffer, &features)?,
        };

        let music_type = classify(&features);
        let downbeats =
            self.downbeats
                .detect(&buffer.samples, buffer.sample_rate, &features, music_type);

        let key = self.resolve_key(&file.path);

        debug!(
            "Analyzed {}: BPM={:.2} ({:?}), type={}, {} downbeats, key={}",
            file.path.file_name().unwrap_or_default().to_string_lossy(),
            tempo.bpm,
            tempo.source,
            music_type,
            downbeats.len(),
            key.as_ref().map(|k| k.camelot.as_str()).unwrap_or("-")
        );

        Ok(AnalyzedTrack {
            track_id,
            path: file.path.clone(),
            tempo,
            key,
            music_type,
            downbeats,
            duration_seconds: buffer.duration,
            sample_rate: buffer.sample_rate,
            stems: None,
            drum_parts: None,
            segments_written: None,
            analyzed_at: chrono::Utc::now(),
        })
    }

    /// Override, else the best detected candidate; detection failures only warn
    fn resolve_key(&self, path: &Path) -> Option<KeyCandidate> {
        if let Some(key) = &self.key_override {
            return Some(key.clone());
        }
        match self.key_detector.detect(path) {
            Ok(candidates) => candidates.into_iter().next(),
            Err(e) => {
                warn!("Key detection failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}

// =============================================================================
// Stem worker
// =============================================================================

/// Job for stem separation worker thread
struct StemJob {
    track_id: i32,
    input_path: PathBuf,
    base_name: String,
    key: Option<String>,
    bpm: f64,
    first_downbeat: Option<f64>,
}

impl StemJob {
    fn for_track(track: &AnalyzedTrack) -> Self {
        Self {
            track_id: track.track_id,
            input_path: track.path.clone(),
            base_name: discovery::base_name(&track.path),
            key: track.key.as_ref().map(|k| k.camelot.clone()),
            bpm: track.tempo.bpm,
            first_downbeat: track.downbeats.first(),
        }
    }

    fn file_name(&self) -> String {
        self.input_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned()
    }
}

/// Result from stem separation worker
#[derive(Default)]
struct StemResult {
    track_id: i32,
    stems: Option<StemPaths>,
    drum_parts: Option<DrumPaths>,
    segments: Option<usize>,
}

/// Stem separation, drum split and chopping for one track
struct StemStage {
    separator: Arc<dyn StemSeparator>,
    drum_separator: Option<Arc<dyn DrumSeparator>>,
    output: PathBuf,
    chop_bars: Option<usize>,
    align_downbeat: bool,
}

impl StemStage {
    fn from_settings(settings: &Settings) -> Option<Self> {
        if !settings.stems_enabled {
            return None;
        }

        let separator = match DemucsSeparator::from_command_line(&settings.demucs_cmd) {
            Some(s) if s.is_available() => s,
            _ => {
                warn!(
                    "Stem separation requested but '{}' is not runnable. Set --demucs-cmd or ${}.",
                    settings.demucs_cmd,
                    crate::config::settings::ENV_DEMUCS
                );
                return None;
            }
        };
        info!("Stem separation enabled using {}", separator.name());

        let drum_separator: Option<Arc<dyn DrumSeparator>> = if settings.drums_enabled {
            match settings.drumsep_script.as_ref().map(DrumsepSeparator::new) {
                Some(d) if d.is_available() => {
                    info!("Drum separation enabled using {}", d.name());
                    Some(Arc::new(d))
                }
                _ => {
                    warn!("Drum separation requested but the drumsep script was not found");
                    None
                }
            }
        } else {
            None
        };

        Some(Self {
            separator: Arc::new(separator),
            drum_separator,
            output: settings.output.clone(),
            chop_bars: settings.chop_enabled.then_some(settings.bars_per_segment),
            align_downbeat: settings.align_downbeat,
        })
    }

    fn process(&self, job: &StemJob, progress: &Sender<ProgressEvent>) -> Result<StemResult> {
        let file_name = job.file_name();
        let key = job.key.as_deref();
        let work = tempfile::Builder::new().prefix("stemgrid-").tempdir()?;

        report(progress, job.track_id, &file_name, Stage::Separating);
        let raw_stems = self.separator.separate(&job.input_path, work.path())?;

        let track_dir = self.output.join(&job.base_name);
        std::fs::create_dir_all(&track_dir).map_err(|e| StemgridError::output_error(&track_dir, e))?;

        let mut stems = StemPaths::new();
        for (kind, src) in raw_stems {
            let dest = track_dir.join(naming::stem_file_name(key, job.bpm, &job.base_name, kind, "wav"));
            move_file(&src, &dest)?;
            stems.insert(kind, dest);
        }
        info!("Stems created for {}", file_name);

        let drum_parts = match (&self.drum_separator, stems.get(&StemKind::Drums)) {
            (Some(drums), Some(drum_stem)) => {
                report(progress, job.track_id, &file_name, Stage::SplittingDrums);
                self.split_drums(drums.as_ref(), drum_stem, work.path(), &track_dir, job)
            }
            _ => None,
        };

        let segments = self.chop_bars.and_then(|bars| {
            report(progress, job.track_id, &file_name, Stage::Chopping);
            let files: Vec<PathBuf> = stems
                .values()
                .chain(drum_parts.iter().flat_map(|d| d.values()))
                .cloned()
                .collect();
            self.chop(&files, bars, &track_dir, job)
        });

        Ok(StemResult {
            track_id: job.track_id,
            stems: Some(stems),
            drum_parts,
            segments,
        })
    }

    /// Segment count, or `None` when the set could not be chopped at all
    fn chop(&self, files: &[PathBuf], bars: usize, track_dir: &Path, job: &StemJob) -> Option<usize> {
        let mut options = ChopOptions::new(job.bpm, bars);
        if self.align_downbeat {
            options = options.with_offset_seconds(job.first_downbeat.unwrap_or(0.0));
        }

        match chop_stem_files(files, &options, &track_dir.join("segments")) {
            Ok(chopped) => Some(chopped.total),
            Err(e) => {
                error!("Chopping failed for {}: {}", job.input_path.display(), e);
                None
            }
        }
    }

    fn split_drums(
        &self,
        separator: &dyn DrumSeparator,
        drum_stem: &Path,
        work_dir: &Path,
        track_dir: &Path,
        job: &StemJob,
    ) -> Option<DrumPaths> {
        let result = separator.separate(drum_stem, &work_dir.join("drums")).and_then(|raw| {
            let mut parts = DrumPaths::new();
            for (part, src) in raw {
                let dest = track_dir.join(naming::drum_part_file_name(
                    job.key.as_deref(),
                    job.bpm,
                    &job.base_name,
                    part,
                    "wav",
                ));
                move_file(&src, &dest)?;
                parts.insert(part, dest);
            }
            Ok(parts)
        });

        match result {
            Ok(parts) => Some(parts),
            Err(e) => {
                warn!("Drum separation failed for {}: {}", job.input_path.display(), e);
                None
            }
        }
    }
}

/// Rename, falling back to copy when the scratch dir is on another filesystem
fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    std::fs::copy(src, dest).map_err(|e| StemgridError::output_error(dest, e))?;
    let _ = std::fs::remove_file(src);
    Ok(())
}

/// Worker thread for stem separation
fn stem_worker(
    rx: Receiver<StemJob>,
    tx: Sender<StemResult>,
    stage: Arc<StemStage>,
    progress: Sender<ProgressEvent>,
) {
    for job in rx {
        debug!("Processing stems for track {}", job.track_id);

        let result = match stage.process(&job, &progress) {
            Ok(result) => {
                report(&progress, job.track_id, &job.file_name(), Stage::StemsDone);
                result
            }
            Err(e) => {
                if e.is_stem_error() {
                    warn!("Stem separation failed for {}: {}", job.input_path.display(), e);
                } else {
                    error!("Stem processing failed for {}: {}", job.input_path.display(), e);
                }
                report(&progress, job.track_id, &job.file_name(), Stage::StemsFailed);
                StemResult {
                    track_id: job.track_id,
                    ..StemResult::default()
                }
            }
        };

        if tx.send(result).is_err() {
            // Receiver dropped, we're shutting down
            break;
        }
    }
}

// =============================================================================
// Batch
// =============================================================================

/// Analysis statistics
struct AnalysisStats {
    successful: usize,
    failed: usize,
    skipped: usize,
}

/// Analyze files in parallel with optional stem separation
fn analyze_files(
    files: &[DiscoveredFile],
    settings: &Settings,
) -> Result<(Vec<AnalyzedTrack>, AnalysisStats)> {
    let analyzer = TrackAnalyzer::from_settings(settings);
    let stem_stage = StemStage::from_settings(settings).map(Arc::new);

    let listener = ProgressListener::spawn(files.len(), settings.show_progress);
    let progress = listener.sender();

    // Bounded job channel: analysis threads block while the stem worker is
    // busy. Results are unbounded so the worker never blocks while we join it.
    let (stem_tx, stem_handle, result_rx) = match &stem_stage {
        Some(stage) => {
            let (job_tx, job_rx) = bounded::<StemJob>(STEM_CHANNEL_CAPACITY);
            let (result_tx, result_rx) = unbounded::<StemResult>();
            let stage = Arc::clone(stage);
            let worker_progress = progress.clone();
            let handle = thread::spawn(move || {
                stem_worker(job_rx, result_tx, stage, worker_progress);
            });
            (Some(job_tx), Some(handle), Some(result_rx))
        }
        None => (None, None, None),
    };

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);

    let tracks: Vec<AnalyzedTrack> = files
        .par_iter()
        .filter_map(|file| {
            let track_id = discovery::generate_track_id(&file.path);
            let file_name = file
                .path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            report(&progress, track_id, &file_name, Stage::Analyzing);

            match analyzer.analyze(file) {
                Ok(track) => {
                    if let Some(tx) = &stem_tx {
                        submit_stem_job(tx, StemJob::for_track(&track));
                    }
                    successful.fetch_add(1, Ordering::Relaxed);
                    report(&progress, track_id, &file_name, Stage::Analyzed);
                    Some(track)
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!("Skipping {}: {}", file.path.display(), e);
                        skipped.fetch_add(1, Ordering::Relaxed);
                        report(&progress, track_id, &file_name, Stage::Skipped);
                    } else {
                        error!("Failed {}: {}", file.path.display(), e);
                        failed.fetch_add(1, Ordering::Relaxed);
                        report(&progress, track_id, &file_name, Stage::Failed);
                    }
                    None
                }
            }
        })
        .collect();

    // Close the job channel so the worker drains and exits
    drop(stem_tx);

    if let Some(handle) = stem_handle {
        if let Err(panic_info) = handle.join() {
            let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            error!(
                "Stem worker thread panicked: {}. Some stems may not have been generated.",
                panic_msg
            );
        }
    }

    let mut tracks = tracks;
    if let Some(result_rx) = result_rx {
        for result in result_rx.try_iter() {
            if let Some(track) = tracks.iter_mut().find(|t| t.track_id == result.track_id) {
                track.stems = result.stems;
                track.drum_parts = result.drum_parts;
                track.segments_written = result.segments;
            }
        }
    }

    drop(progress);
    let tally = listener.finish();
    debug!(
        "Progress: {} analyzed, {} skipped, {} failed, {} stem jobs done, {} stem jobs failed",
        tally.analyzed, tally.skipped, tally.failed, tally.stems_done, tally.stems_failed
    );

    let stats = AnalysisStats {
        successful: successful.load(Ordering::Relaxed),
        failed: failed.load(Ordering::Relaxed),
        skipped: skipped.load(Ordering::Relaxed),
    };

    Ok((tracks, stats))
}

fn submit_stem_job(tx: &Sender<StemJob>, job: StemJob) {
    let path = job.input_path.clone();
    match tx.send_timeout(job, STEM_SEND_TIMEOUT) {
        Ok(()) => {}
        Err(crossbeam_channel::SendTimeoutError::Timeout(_)) => {
            warn!(
                "Stem job queue blocked for {}s, skipping stems for {}. Stem worker may have crashed.",
                STEM_SEND_TIMEOUT.as_secs(),
                path.display()
            );
        }
        Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
            debug!("Stem channel closed, skipping stems for {}", path.display());
        }
    }
}

/// Export analysis results
fn export_results(tracks: &[AnalyzedTrack], json_path: &Path, settings: &Settings) -> Result<()> {
    let export_start = Instant::now();
    std::fs::create_dir_all(&settings.output)
        .map_err(|e| StemgridError::output_error(&settings.output, e))?;

    export::write_json(tracks, json_path)?;

    info!(
        "Export completed in {:.2}s",
        export_start.elapsed().as_secs_f64()
    );
    Ok(())
}
