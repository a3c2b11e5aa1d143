//! File discovery and scanning

use crate::error::{Result, StemgridError};
use crate::types::AudioFormat;
use hash32::FnvHasher;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Discovered audio file with basic metadata
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    pub format: AudioFormat,
    pub size_bytes: u64,
}

impl DiscoveredFile {
    /// File name without extension
    pub fn base_name(&self) -> String {
        base_name(&self.path)
    }
}

/// File name without extension ("unknown" if the path has none)
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Scan a path (file or directory) for supported audio files, sorted by path
pub fn scan(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    scan_matching(input, recursive, |_| true)
}

/// Scan for WAV files only (stems to be chopped)
pub fn scan_wavs(input: &Path, recursive: bool) -> Result<Vec<DiscoveredFile>> {
    scan_matching(input, recursive, |format| format == AudioFormat::Wav)
}

fn scan_matching(
    input: &Path,
    recursive: bool,
    accept: impl Fn(AudioFormat) -> bool,
) -> Result<Vec<DiscoveredFile>> {
    if !input.exists() {
        return Err(StemgridError::FileNotFound(input.to_path_buf()));
    }

    let mut files = Vec::new();

    if input.is_file() {
        match try_discover_file(input) {
            Some(file) if accept(file.format) => files.push(file),
            _ => {
                return Err(StemgridError::UnsupportedFormat {
                    path: input.to_path_buf(),
                    format: input
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("unknown")
                        .to_string(),
                });
            }
        }
    } else if input.is_dir() {
        let walker = if recursive {
            WalkDir::new(input)
        } else {
            WalkDir::new(input).max_depth(1)
        };

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() {
                if let Some(file) = try_discover_file(path).filter(|f| accept(f.format)) {
                    debug!("Discovered: {}", file.path.display());
                    files.push(file);
                }
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!("Discovered {} audio files", files.len());

    if files.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    Ok(files)
}

fn try_discover_file(path: &Path) -> Option<DiscoveredFile> {
    let ext = path.extension()?.to_str()?;
    let format = AudioFormat::from_extension(ext)?;
    let size_bytes = std::fs::metadata(path).ok()?.len();

    Some(DiscoveredFile {
        path: path.to_path_buf(),
        format,
        size_bytes,
    })
}

/// Deterministic track ID from a file path (FNV-1a, non-negative)
pub fn generate_track_id(path: &Path) -> i32 {
    use hash32::Hasher as Hash32Hasher;

    let mut hasher = FnvHasher::default();
    hasher.write(normalize_path_for_hash(path).as_bytes());
    (hasher.finish32() & 0x7FFF_FFFF) as i32
}

/// Forward slashes, lowercase, so the same file hashes the same on every platform
fn normalize_path_for_hash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_track_id_deterministic() {
        let path = Path::new("/music/dj/track.mp3");
        assert_eq!(generate_track_id(path), generate_track_id(path));
        assert!(generate_track_id(path) >= 0);
    }

    #[test]
    fn test_path_normalization() {
        let win = normalize_path_for_hash(Path::new("C:\\Music\\Track.mp3"));
        let unix = normalize_path_for_hash(Path::new("c:/music/track.mp3"));
        assert_eq!(win, unix);
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.wav", "a.mp3", "notes.txt", "c.m4a"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let nested = dir.path().join("sub");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("d.flac"), b"x").unwrap();

        let flat: Vec<String> = scan(dir.path(), false)
            .unwrap()
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(flat, vec!["a.mp3", "b.wav", "c.m4a"]);

        assert_eq!(scan(dir.path(), true).unwrap().len(), 4);
        assert_eq!(scan_wavs(dir.path(), true).unwrap().len(), 1);
    }

    #[test]
    fn test_single_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"x").unwrap();
        assert!(matches!(
            scan(&path, false),
            Err(StemgridError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name(Path::new("/x/My Song.flac")), "My Song");
    }
}
