//! Core data types for stemgrid
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    Cs, // C#/Db
    D,
    Ds, // D#/Eb
    E,
    F,
    Fs, // F#/Gb
    G,
    Gs, // G#/Ab
    A,
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// Parse a tonic name such as "C", "F#", "Bb" or "Ab"
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let base: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let offset = match chars.as_str() {
            "" => 0,
            "#" | "s" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return None,
        };
        Some(Self::from_semitone((base + offset).rem_euclid(12) as u8))
    }

    fn from_semitone(index: u8) -> Self {
        match index % 12 {
            0 => PitchClass::C,
            1 => PitchClass::Cs,
            2 => PitchClass::D,
            3 => PitchClass::Ds,
            4 => PitchClass::E,
            5 => PitchClass::F,
            6 => PitchClass::Fs,
            7 => PitchClass::G,
            8 => PitchClass::Gs,
            9 => PitchClass::A,
            10 => PitchClass::As,
            _ => PitchClass::B,
        }
    }

    /// Standard notation (e.g., "C", "F#", "A#")
    pub fn to_standard_notation(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }
}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    Major,
    Minor,
}

impl Mode {
    /// Parse "major"/"minor" (case-insensitive, "maj"/"min" accepted)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "major" | "maj" => Some(Mode::Major),
            "minor" | "min" => Some(Mode::Minor),
            _ => None,
        }
    }
}

/// One ranked key estimate, consumed only to prefix output file names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCandidate {
    /// Camelot notation ("1A" - "12B")
    pub camelot: String,
    /// Human readable key name ("A minor")
    pub full_name: String,
    /// Detector confidence in [0, 1], absent when the detector gave none
    pub confidence: Option<f64>,
}

// =============================================================================
// Tempo
// =============================================================================

/// Where a tempo estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempoSource {
    /// External ML predictor
    Ml,
    /// Onset-envelope autocorrelation
    Fallback,
    /// User supplied override
    Manual,
}

/// Tempo analysis result
///
/// `bpm` is always positive and rounded to two decimals. An absent confidence
/// means "unknown", which is not the same as zero confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEstimate {
    pub bpm: f64,
    pub confidence: Option<f64>,
    pub source: TempoSource,
}

// =============================================================================
// Features and classification
// =============================================================================

/// Fixed analysis frequency bands, half-open in Hz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    SubBass,
    Bass,
    LowMid,
    Mid,
    HighMid,
    High,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::SubBass,
        Band::Bass,
        Band::LowMid,
        Band::Mid,
        Band::HighMid,
        Band::High,
    ];

    /// Frequency range `[low, high)` in Hz
    pub fn range_hz(self) -> (f32, f32) {
        match self {
            Band::SubBass => (20.0, 60.0),
            Band::Bass => (60.0, 250.0),
            Band::LowMid => (250.0, 500.0),
            Band::Mid => (500.0, 2000.0),
            Band::HighMid => (2000.0, 4000.0),
            Band::High => (4000.0, 20000.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::SubBass => "sub_bass",
            Band::Bass => "bass",
            Band::LowMid => "low_mid",
            Band::Mid => "mid",
            Band::HighMid => "high_mid",
            Band::High => "high",
        }
    }
}

/// Frame-rate features of one track, immutable once computed
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Onset strength, one value per analysis frame
    pub onset_envelope: Vec<f32>,
    /// Autocorrelation tempogram, indexed `[lag][frame]`
    pub tempogram: Vec<Vec<f32>>,
    /// Mean magnitude in dB per band, one value per frame
    pub band_energies: BTreeMap<Band, Vec<f32>>,
    /// Sample rate of the analysed signal
    pub sample_rate: u32,
    /// Samples between consecutive frames
    pub hop_length: usize,
}

impl FeatureSet {
    /// Analysis frames per second
    pub fn frame_rate(&self) -> f64 {
        self.sample_rate as f64 / self.hop_length as f64
    }

    pub fn num_frames(&self) -> usize {
        self.onset_envelope.len()
    }

    /// Energy curve for one band (empty if the band was not computed)
    pub fn band(&self, band: Band) -> &[f32] {
        self.band_energies
            .get(&band)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

/// Rhythmic archetype of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MusicType {
    Ambient,
    BassHeavy,
    Bright,
    Balanced,
}

impl MusicType {
    pub fn is_rhythmic(self) -> bool {
        self != MusicType::Ambient
    }
}

impl fmt::Display for MusicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MusicType::Ambient => "ambient",
            MusicType::BassHeavy => "bass_heavy",
            MusicType::Bright => "bright",
            MusicType::Balanced => "balanced",
        };
        f.write_str(name)
    }
}

/// Strictly increasing downbeat times in seconds. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownbeatSet(Vec<f64>);

impl DownbeatSet {
    /// Build from candidate times, dropping anything that does not strictly
    /// increase or is not finite
    pub fn from_times(times: impl IntoIterator<Item = f64>) -> Self {
        let mut out: Vec<f64> = Vec::new();
        for t in times {
            if !t.is_finite() || t < 0.0 {
                continue;
            }
            if out.last().map_or(true, |&last| t > last) {
                out.push(t);
            }
        }
        Self(out)
    }

    pub fn times(&self) -> &[f64] {
        &self.0
    }

    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Stems
// =============================================================================

/// Instrumental stems produced by the stem separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StemKind {
    Drums,
    Bass,
    Vocals,
    Other,
}

impl StemKind {
    pub const ALL: [StemKind; 4] = [StemKind::Drums, StemKind::Bass, StemKind::Vocals, StemKind::Other];

    pub fn name(self) -> &'static str {
        match self {
            StemKind::Drums => "drums",
            StemKind::Bass => "bass",
            StemKind::Vocals => "vocals",
            StemKind::Other => "other",
        }
    }
}

/// Drum kit components produced by the drum sub-separator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrumPart {
    Kick,
    Snare,
    Cymbals,
    Toms,
}

impl DrumPart {
    pub const ALL: [DrumPart; 4] = [DrumPart::Kick, DrumPart::Snare, DrumPart::Cymbals, DrumPart::Toms];

    pub fn name(self) -> &'static str {
        match self {
            DrumPart::Kick => "kick",
            DrumPart::Snare => "snare",
            DrumPart::Cymbals => "cymbals",
            DrumPart::Toms => "toms",
        }
    }
}

/// Paths to separated stem files
pub type StemPaths = BTreeMap<StemKind, PathBuf>;

/// Paths to separated drum part files
pub type DrumPaths = BTreeMap<DrumPart, PathBuf>;

// =============================================================================
// Track representation
// =============================================================================

/// Complete analysis result for a single track
#[derive(Debug, Clone)]
pub struct AnalyzedTrack {
    /// Deterministic ID derived from path
    pub track_id: i32,
    /// Original file path
    pub path: PathBuf,
    pub tempo: TempoEstimate,
    /// Best key estimate, if any detector produced one
    pub key: Option<KeyCandidate>,
    pub music_type: MusicType,
    pub downbeats: DownbeatSet,
    pub duration_seconds: f64,
    /// Sample rate of the analysis buffer
    pub sample_rate: u32,
    /// Renamed stem files (if separation ran)
    pub stems: Option<StemPaths>,
    /// Renamed drum part files (if drum separation ran)
    pub drum_parts: Option<DrumPaths>,
    /// Number of segment files written (if chopping ran)
    pub segments_written: Option<usize>,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Mono samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            duration,
        }
    }

    /// Downmix channel-major audio to mono by averaging channels
    pub fn from_channels(channels: &[Vec<f32>], sample_rate: u32) -> Self {
        let len = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let count = channels.len().max(1) as f32;
        let samples = (0..len)
            .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / count)
            .collect();
        Self::new(samples, sample_rate)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Sample encoding of a stored waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Int,
    Float,
}

/// Storage format of a waveform read from disk, reproduced exactly on write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub sample_kind: SampleKind,
}

/// Multi-channel audio stored channel-major (`channels[c][i]`)
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform<T = f32> {
    pub channels: Vec<Vec<T>>,
    pub sample_rate: u32,
    /// Present when the waveform was read from a file
    pub format: Option<FormatInfo>,
}

impl<T: Copy> Waveform<T> {
    pub fn new(channels: Vec<Vec<T>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            format: None,
        }
    }

    pub fn with_format(mut self, format: FormatInfo) -> Self {
        self.format = Some(format);
        self
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels.iter().map(|c| c.len()).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Copy `[start, end)` of every channel into a new waveform with the same format
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            channels: self.channels.iter().map(|c| c[start..end].to_vec()).collect(),
            sample_rate: self.sample_rate,
            format: self.format,
        }
    }
}

// =============================================================================
// Supported formats
// =============================================================================

/// Audio formats accepted as pipeline input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Flac,
    Aiff,
    M4a,
}

impl AudioFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "aiff" | "aif" => Some(AudioFormat::Aiff),
            "m4a" => Some(AudioFormat::M4a),
            _ => None,
        }
    }

    /// Check if a path has a supported extension
    pub fn is_supported_path(path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_parse() {
        assert_eq!(PitchClass::parse("C"), Some(PitchClass::C));
        assert_eq!(PitchClass::parse("F#"), Some(PitchClass::Fs));
        assert_eq!(PitchClass::parse("Bb"), Some(PitchClass::As));
        assert_eq!(PitchClass::parse("Cb"), Some(PitchClass::B));
        assert_eq!(PitchClass::parse("H"), None);
        assert_eq!(PitchClass::parse(""), None);
    }

    #[test]
    fn test_downbeats_strictly_increasing() {
        let set = DownbeatSet::from_times(vec![0.5, 0.5, 0.2, 1.0, f64::NAN, 2.0]);
        assert_eq!(set.times(), &[0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let buffer = AudioBuffer::from_channels(&[vec![1.0, 0.0, 0.5], vec![0.0, 0.0, 0.5]], 100);
        assert_eq!(buffer.samples, vec![0.5, 0.0, 0.5]);
        assert!((buffer.duration - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_waveform_slice_keeps_format() {
        let format = FormatInfo {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 24,
            sample_kind: SampleKind::Int,
        };
        let wf = Waveform::new(vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]], 44100).with_format(format);
        let part = wf.slice(1, 3);
        assert_eq!(part.channels, vec![vec![2, 3], vec![6, 7]]);
        assert_eq!(part.format, Some(format));
    }

    #[test]
    fn test_audio_format_extensions() {
        assert_eq!(AudioFormat::from_extension("M4A"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_extension("aif"), Some(AudioFormat::Aiff));
        assert_eq!(AudioFormat::from_extension("ogg"), None);
    }
}
