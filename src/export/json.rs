//! JSON analysis report

use crate::discovery::base_name;
use crate::error::{Result, StemgridError};
use crate::naming::track_file_name;
use crate::types::{AnalyzedTrack, MusicType, TempoSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// JSON output schema version
const SCHEMA_VERSION: &str = "1.0";

/// Report file name inside the output directory
pub const REPORT_FILE_NAME: &str = "stemgrid.json";

/// Top-level JSON output structure
#[derive(Debug, Serialize, Deserialize)]
pub struct StemgridReport {
    /// Schema version for forward compatibility
    pub version: String,
    pub metadata: ExportMetadata,
    pub tracks: Vec<TrackJson>,
}

/// Export metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// stemgrid version that generated this file
    pub generator_version: String,
    /// Timestamp of export (RFC 3339)
    pub exported_at: String,
    pub track_count: usize,
}

/// JSON representation of an analyzed track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackJson {
    pub track_id: i32,
    /// Source file path
    pub path: String,
    /// File name under the `<key>_<bpm>BPM_<base>` convention
    #[serde(default)]
    pub tagged_name: String,
    pub bpm: BpmJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyJson>,
    pub music_type: MusicType,
    /// Downbeat times in seconds
    #[serde(default)]
    pub downbeats: Vec<f64>,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stems: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drum_parts: Option<BTreeMap<String, String>>,
    /// Number of segment files written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpmJson {
    pub value: f64,
    /// Absent when the estimate came from the fallback or a manual override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub source: TempoSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyJson {
    /// Camelot wheel notation (e.g., "8A")
    pub camelot: String,
    /// Full key name (e.g., "A minor")
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// Write analyzed tracks to a JSON file
///
/// Tracks from an earlier report that were not re-analyzed are kept, so a
/// partial re-run never loses results. Uses the atomic write pattern: writes
/// to a temp file first, then renames.
pub fn write_json(tracks: &[AnalyzedTrack], output_path: &Path) -> Result<()> {
    let fresh: Vec<TrackJson> = tracks.iter().map(track_to_json).collect();
    let fresh_paths: HashSet<&str> = fresh.iter().map(|t| t.path.as_str()).collect();

    let mut merged: Vec<TrackJson> = read_existing_tracks(output_path)
        .into_iter()
        .filter(|t| !fresh_paths.contains(t.path.as_str()))
        .collect();
    let preserved = merged.len();
    merged.extend(fresh);
    merged.sort_by(|a, b| a.path.cmp(&b.path));

    if preserved > 0 {
        debug!("Preserving {} tracks from the existing report", preserved);
    }

    write_report(&merged, output_path)?;
    info!("Wrote {} tracks to {}", merged.len(), output_path.display());
    Ok(())
}

fn write_report(tracks: &[TrackJson], output_path: &Path) -> Result<()> {
    // Same directory, so the rename stays on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path).map_err(|e| StemgridError::OutputError {
        path: output_path.to_path_buf(),
        reason: format!("Failed to create temp file: {}", e),
    })?;

    let report = StemgridReport {
        version: SCHEMA_VERSION.to_string(),
        metadata: ExportMetadata {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: chrono::Utc::now().to_rfc3339(),
            track_count: tracks.len(),
        },
        tracks: tracks.to_vec(),
    };

    serde_json::to_writer_pretty(BufWriter::new(file), &report).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemgridError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        StemgridError::OutputError {
            path: output_path.to_path_buf(),
            reason: format!("Failed to finalize file: {}", e),
        }
    })?;

    Ok(())
}

fn track_to_json(track: &AnalyzedTrack) -> TrackJson {
    let path_string = |p: &Path| p.to_string_lossy().into_owned();

    TrackJson {
        track_id: track.track_id,
        path: path_string(&track.path),
        tagged_name: track_file_name(
            track.key.as_ref().map(|k| k.camelot.as_str()),
            track.tempo.bpm,
            &base_name(&track.path),
            &track
                .path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ),
        bpm: BpmJson {
            value: track.tempo.bpm,
            confidence: track.tempo.confidence,
            source: track.tempo.source,
        },
        key: track.key.as_ref().map(|k| KeyJson {
            camelot: k.camelot.clone(),
            full_name: k.full_name.clone(),
            confidence: k.confidence,
        }),
        music_type: track.music_type,
        downbeats: track.downbeats.times().to_vec(),
        duration_seconds: track.duration_seconds,
        sample_rate: track.sample_rate,
        stems: track
            .stems
            .as_ref()
            .map(|s| s.iter().map(|(k, p)| (k.name().to_string(), path_string(p))).collect()),
        drum_parts: track
            .drum_parts
            .as_ref()
            .map(|d| d.iter().map(|(k, p)| (k.name().to_string(), path_string(p))).collect()),
        segments: track.segments_written,
        analyzed_at: Some(track.analyzed_at.to_rfc3339()),
    }
}

fn read_report(json_path: &Path) -> Option<StemgridReport> {
    if !json_path.exists() {
        debug!("No existing analysis file at {}", json_path.display());
        return None;
    }

    let file = match File::open(json_path) {
        Ok(f) => f,
        Err(e) => {
            debug!("Could not open existing analysis: {}", e);
            return None;
        }
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(report) => Some(report),
        Err(e) => {
            debug!("Could not parse existing analysis: {}", e);
            None
        }
    }
}

/// Read existing analysis from JSON file
///
/// Returns the set of file paths that have already been analyzed.
/// If the file doesn't exist or can't be parsed, returns an empty set.
pub fn read_existing_analysis(json_path: &Path) -> HashSet<String> {
    let paths: HashSet<String> = read_existing_tracks(json_path)
        .into_iter()
        .map(|t| t.path)
        .collect();

    if !paths.is_empty() {
        debug!(
            "Loaded {} previously analyzed tracks from {}",
            paths.len(),
            json_path.display()
        );
    }

    paths
}

/// Read existing analysis and return the full track data
pub fn read_existing_tracks(json_path: &Path) -> Vec<TrackJson> {
    read_report(json_path).map(|r| r.tracks).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DownbeatSet, KeyCandidate, TempoEstimate};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn track(path: &str, bpm: f64) -> AnalyzedTrack {
        AnalyzedTrack {
            track_id: 7,
            path: PathBuf::from(path),
            tempo: TempoEstimate {
                bpm,
                confidence: None,
                source: TempoSource::Fallback,
            },
            key: Some(KeyCandidate {
                camelot: "8A".to_string(),
                full_name: "A minor".to_string(),
                confidence: Some(0.7),
            }),
            music_type: MusicType::BassHeavy,
            downbeats: DownbeatSet::from_times([0.5, 2.5]),
            duration_seconds: 30.0,
            sample_rate: 22050,
            stems: None,
            drum_parts: None,
            segments_written: None,
            analyzed_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REPORT_FILE_NAME);
        write_json(&[track("/music/a.mp3", 128.0)], &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"source\": \"fallback\""));
        assert!(text.contains("\"music_type\": \"bass_heavy\""));
        // Unknown confidence is omitted, not written as zero
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let bpm = &value["tracks"][0]["bpm"];
        assert!(bpm.get("confidence").is_none());
        assert_eq!(value["tracks"][0]["key"]["camelot"], "8A");
        assert_eq!(value["tracks"][0]["tagged_name"], "8A_128.00BPM_a.mp3");
        assert_eq!(value["metadata"]["track_count"], 1);
        assert!(!dir.path().join("stemgrid.json.tmp").exists());

        let existing = read_existing_analysis(&path);
        assert!(existing.contains("/music/a.mp3"));
    }

    #[test]
    fn test_existing_tracks_are_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REPORT_FILE_NAME);
        write_json(&[track("/music/a.mp3", 128.0)], &path).unwrap();
        write_json(&[track("/music/b.mp3", 100.0), track("/music/a.mp3", 127.0)], &path).unwrap();

        let tracks = read_existing_tracks(&path);
        assert_eq!(tracks.len(), 2);
        let a = tracks.iter().find(|t| t.path == "/music/a.mp3").unwrap();
        assert_eq!(a.bpm.value, 127.0);
    }

    #[test]
    fn test_missing_or_corrupt_report_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REPORT_FILE_NAME);
        assert!(read_existing_analysis(&path).is_empty());
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_existing_tracks(&path).is_empty());
    }
}
