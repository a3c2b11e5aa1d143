//! Integration tests for the stemgrid pipeline
//!
//! Fixtures are synthesised WAV files (sines, click tracks, multi-channel
//! stems) written into temp directories.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stemgrid::analysis::{classify, FeatureExtractor, TempoEstimator, TempoPredictor};
use stemgrid::config::Settings;
use stemgrid::error::StemgridError;
use stemgrid::pipeline;
use stemgrid::segment::BarSegmenter;
use stemgrid::types::{AudioBuffer, MusicType, TempoSource, Waveform};
use tempfile::TempDir;

/// Generate a sine wave WAV file for testing
///
/// Creates a mono 16-bit WAV file at the specified path.
fn generate_sine_wav(path: &Path, frequency_hz: f32, duration_secs: f32, sample_rate: u32) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * 0.5;
        writer
            .write_sample((sample * 32767.0) as i16)
            .expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

/// Click track samples: short decaying impulses on every beat
fn click_samples(bpm: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    // ~5ms click
    let impulse_samples = (0.005 * sample_rate as f32) as usize;

    (0..num_samples)
        .map(|i| {
            let position_in_beat = i % samples_per_beat;
            if position_in_beat < impulse_samples {
                let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
                0.8 * decay
            } else {
                0.0
            }
        })
        .collect()
}

/// Generate a click track WAV file for BPM testing
fn generate_click_track(path: &Path, bpm: f32, duration_secs: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");
    for sample in click_samples(bpm, duration_secs, sample_rate) {
        writer
            .write_sample((sample * 32767.0) as i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// Generate a stereo 24-bit stem of `frames` frames
fn generate_stem(path: &Path, frames: usize, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 24,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");
    for i in 0..frames {
        let v = ((i % 1000) as i32 - 500) * 1000;
        writer.write_sample(v).unwrap();
        writer.write_sample(-v).unwrap();
    }
    writer.finalize().unwrap();
}

/// Create test settings with progress bars disabled
fn create_test_settings(input: &Path, output: &Path) -> Settings {
    Settings {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        analysis_threads: 2,
        recursive: true,
        show_progress: false, // Disable progress bars in tests
        ..Settings::default()
    }
}

fn read_report(output_dir: &Path) -> serde_json::Value {
    let json_content =
        fs::read_to_string(output_dir.join("stemgrid.json")).expect("Failed to read JSON");
    serde_json::from_str(&json_content).expect("Should be valid JSON")
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Analysis pipeline
// =============================================================================

#[test]
fn test_pipeline_produces_valid_json() {
    let input_dir = TempDir::new().expect("Failed to create input temp dir");
    let output_dir = TempDir::new().expect("Failed to create output temp dir");

    generate_click_track(&input_dir.path().join("click_120bpm.wav"), 120.0, 10.0, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run(&settings).expect("Pipeline should succeed");

    assert_eq!(result.total_files, 1, "Should find 1 file");
    assert_eq!(result.successful, 1, "Should successfully analyze 1 file");
    assert_eq!(result.failed, 0, "Should have no failures");

    let json = read_report(output_dir.path());
    assert!(json.get("version").is_some(), "Should have version field");
    assert_eq!(json["metadata"]["track_count"], 1);

    let track = &json["tracks"][0];
    assert!(track.get("track_id").is_some());
    assert!(track.get("path").is_some());
    assert!(track.get("duration_seconds").is_some());
    assert_eq!(track["sample_rate"], 22050);

    // No predictor configured: the fallback answers with unknown confidence
    let bpm = &track["bpm"];
    assert_eq!(bpm["source"], "fallback");
    assert!(bpm.get("confidence").is_none(), "Fallback confidence is absent, not zero");
    let value = bpm["value"].as_f64().unwrap();
    assert!(
        (115.0..=125.0).contains(&value),
        "BPM {} should be close to 120",
        value
    );

    // No key detector configured
    assert!(track.get("key").is_none());

    let music_type = track["music_type"].as_str().unwrap();
    assert_ne!(music_type, "ambient", "A click track is rhythmic");

    let downbeats: Vec<f64> = track["downbeats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert!(downbeats.windows(2).all(|w| w[1] > w[0]), "Downbeats must increase");
    assert!(downbeats.iter().all(|&t| (0.0..=10.0).contains(&t)));
}

#[test]
fn test_pipeline_handles_empty_directory() {
    let input_dir = TempDir::new().expect("Failed to create input temp dir");
    let output_dir = TempDir::new().expect("Failed to create output temp dir");

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run(&settings).expect("Pipeline should succeed on empty directory");

    assert_eq!(result, pipeline::PipelineResult::default());
    assert!(
        !output_dir.path().join("stemgrid.json").exists(),
        "stemgrid.json should not exist for empty input"
    );
}

#[test]
fn test_short_track_is_skipped_not_failed() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    generate_sine_wav(&input_dir.path().join("blip.wav"), 440.0, 1.0, 44100);
    generate_click_track(&input_dir.path().join("clicks.wav"), 128.0, 6.0, 44100);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    let result = pipeline::run(&settings).unwrap();

    assert_eq!(result.total_files, 2);
    assert_eq!(result.successful, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.failed, 0);
}

#[test]
fn test_second_run_skips_analyzed_tracks() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_click_track(&input_dir.path().join("a.wav"), 100.0, 5.0, 22050);

    let settings = create_test_settings(input_dir.path(), output_dir.path());
    assert_eq!(pipeline::run(&settings).unwrap().successful, 1);

    let again = pipeline::run(&settings).unwrap();
    assert_eq!(again.successful, 0);
    assert_eq!(again.skipped, 1);

    let forced = Settings {
        force: true,
        ..settings
    };
    assert_eq!(pipeline::run(&forced).unwrap().successful, 1);
    assert_eq!(read_report(output_dir.path())["tracks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_dry_run_writes_nothing() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_sine_wav(&input_dir.path().join("a.wav"), 440.0, 4.0, 22050);

    let settings = Settings {
        dry_run: true,
        ..create_test_settings(input_dir.path(), output_dir.path())
    };
    let result = pipeline::run(&settings).unwrap();

    assert_eq!(result.total_files, 1);
    assert_eq!(result.skipped, 1);
    assert!(file_names(output_dir.path()).is_empty());
}

#[test]
fn test_manual_overrides_reach_the_report() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_click_track(&input_dir.path().join("song.wav"), 120.0, 5.0, 44100);

    let settings = Settings {
        bpm_override: Some(126.0),
        key_override: Some("11b".to_string()),
        ..create_test_settings(input_dir.path(), output_dir.path())
    };
    pipeline::run(&settings).unwrap();

    let track = &read_report(output_dir.path())["tracks"][0];
    assert_eq!(track["bpm"]["value"], 126.0);
    assert_eq!(track["bpm"]["source"], "manual");
    assert_eq!(track["key"]["camelot"], "11B");
    assert_eq!(track["key"]["full_name"], "A major");
    assert_eq!(track["tagged_name"], "11B_126.00BPM_song.wav");
}

/// A stand-in for demucs that copies its input into every stem
#[cfg(unix)]
fn write_fake_demucs(dir: &Path) -> PathBuf {
    let script = dir.join("fake_demucs.sh");
    fs::write(
        &script,
        r#"#!/bin/sh
if [ "$1" = "--help" ]; then exit 0; fi
while [ $# -gt 0 ]; do
  case "$1" in
    -n) shift; model="$1" ;;
    -o) shift; out="$1" ;;
    *) input="$1" ;;
  esac
  shift
done
base=$(basename "$input")
base="${base%.*}"
mkdir -p "$out/$model/$base"
for stem in drums bass vocals other; do
  cp "$input" "$out/$model/$base/$stem.wav"
done
"#,
    )
    .unwrap();
    script
}

#[cfg(unix)]
#[test]
fn test_stems_are_renamed_and_chopped() {
    let tools_dir = TempDir::new().unwrap();
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    let script = write_fake_demucs(tools_dir.path());
    generate_click_track(&input_dir.path().join("clicks.wav"), 120.0, 6.5, 22050);

    let settings = Settings {
        stems_enabled: true,
        chop_enabled: true,
        bars_per_segment: 1,
        bpm_override: Some(120.0),
        key_override: Some("8A".to_string()),
        demucs_cmd: format!("sh {}", script.display()),
        ..create_test_settings(input_dir.path(), output_dir.path())
    };
    settings.validate().unwrap();
    let result = pipeline::run(&settings).unwrap();
    assert_eq!(result.successful, 1);

    let track_dir = output_dir.path().join("clicks");
    let stems = file_names(&track_dir);
    assert!(stems.contains(&"8A_120.00BPM_clicks-drums.wav".to_string()), "{:?}", stems);
    assert!(stems.contains(&"8A_120.00BPM_clicks-other.wav".to_string()));

    // 6.5 s at 2 s per bar: 3 one-bar segments per stem
    let segments = file_names(&track_dir.join("segments"));
    assert_eq!(segments.len(), 12, "{:?}", segments);
    assert!(segments.contains(&"B3_8A_120.00BPM_clicks-bass.wav".to_string()));

    let reader = hound::WavReader::open(track_dir.join("segments/B1_8A_120.00BPM_clicks-vocals.wav")).unwrap();
    assert_eq!(reader.duration(), 44100);

    let track = &read_report(output_dir.path())["tracks"][0];
    assert_eq!(track["segments"], 12);
    assert!(track["stems"]["drums"]
        .as_str()
        .unwrap()
        .ends_with("8A_120.00BPM_clicks-drums.wav"));
}

// =============================================================================
// Segment-only mode
// =============================================================================

#[test]
fn test_segment_only_preserves_format_and_skips_rate_mismatch() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();

    // 128 BPM at 44.1 kHz: round(82687.5) = 82688 samples per bar
    let per_bar = 82688;
    generate_stem(&input_dir.path().join("128.00BPM_song-drums.wav"), per_bar * 5, 44100);
    generate_stem(&input_dir.path().join("128.00BPM_song-vocals.wav"), per_bar * 5, 48000);

    let settings = Settings {
        segment_only: true,
        bars_per_segment: 2,
        ..create_test_settings(input_dir.path(), output_dir.path())
    };
    let result = pipeline::run(&settings).unwrap();

    assert_eq!(result.total_files, 2);
    assert_eq!(result.successful, 1);
    assert_eq!(result.skipped, 1, "48 kHz stem must be skipped, not resampled");

    let segments_dir = output_dir.path().join("segments");
    assert_eq!(
        file_names(&segments_dir),
        vec!["B1_128.00BPM_song-drums.wav", "B3_128.00BPM_song-drums.wav"]
    );

    let reader = hound::WavReader::open(segments_dir.join("B3_128.00BPM_song-drums.wav")).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.bits_per_sample, 24);
    assert_eq!(spec.sample_rate, 44100);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    assert_eq!(reader.duration() as usize, per_bar * 2);
}

#[test]
fn test_segment_only_needs_a_bpm() {
    let input_dir = TempDir::new().unwrap();
    let output_dir = TempDir::new().unwrap();
    generate_stem(&input_dir.path().join("drums.wav"), 1000, 44100);

    let settings = Settings {
        segment_only: true,
        ..create_test_settings(input_dir.path(), output_dir.path())
    };
    assert!(matches!(
        pipeline::run(&settings),
        Err(StemgridError::ConfigError(_))
    ));
}

// =============================================================================
// Library API
// =============================================================================

struct BrokenPredictor;

impl TempoPredictor for BrokenPredictor {
    fn predict(&self, _buffer: &AudioBuffer) -> stemgrid::Result<(f64, f64)> {
        Err(StemgridError::tool_failed("model", "crashed"))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[test]
fn test_tempo_falls_back_when_predictor_fails() {
    let buffer = AudioBuffer::new(click_samples(128.0, 12.0, 22050), 22050);
    let estimate = TempoEstimator::new(Arc::new(BrokenPredictor))
        .estimate(&buffer)
        .unwrap();

    assert_eq!(estimate.source, TempoSource::Fallback);
    assert_eq!(estimate.confidence, None);
    assert!((estimate.bpm - 128.0).abs() < 4.0, "got {}", estimate.bpm);
    // Rounded to two decimals
    assert_eq!((estimate.bpm * 100.0).round() / 100.0, estimate.bpm);
}

#[test]
fn test_steady_tone_is_ambient_and_clicks_are_not() {
    let extractor = FeatureExtractor::new();

    // Half-second raised-cosine fades so the edges do not read as onsets
    let n = 22050 * 8;
    let fade = 11025;
    let tone: Vec<f32> = (0..n)
        .map(|i| {
            let edge = i.min(n - 1 - i);
            let gain = if edge < fade {
                0.5 - 0.5 * (std::f32::consts::PI * edge as f32 / fade as f32).cos()
            } else {
                1.0
            };
            (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 22050.0).sin() * 0.3 * gain
        })
        .collect();
    let features = extractor.extract(&tone, 22050).unwrap();
    assert_eq!(classify(&features), MusicType::Ambient);

    let clicks = click_samples(120.0, 8.0, 22050);
    let features = extractor.extract(&clicks, 22050).unwrap();
    assert!(classify(&features).is_rhythmic());
}

#[test]
fn test_stems_of_different_lengths_share_boundaries() {
    let segmenter = BarSegmenter::new(123.0, 4).unwrap().with_offset(777);
    let long: Waveform<f32> = Waveform::new(vec![vec![0.0; 1_000_000]], 44100);
    let short: Waveform<f32> = Waveform::new(vec![vec![0.0; 600_000]], 44100);

    let a = segmenter.segments(&long).unwrap();
    let b = segmenter.segments(&short).unwrap();
    assert!(b.len() < a.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.bounds, y.bounds);
    }
    assert_eq!(a[1].bounds.start_bar, 5);
}
