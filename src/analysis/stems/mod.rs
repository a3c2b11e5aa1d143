//! Stem and drum separation
//!
//! Both separators are external programs. They write into a scratch
//! directory; the pipeline moves the results into place under their final
//! names.

pub mod drums;
pub mod separator;

pub use drums::DrumsepSeparator;
pub use separator::DemucsSeparator;

use crate::analysis::traits::{DrumSeparator, StemSeparator};
use crate::error::{Result, StemgridError};
use crate::types::{DrumPaths, StemPaths};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;
use walkdir::WalkDir;

/// Run an external tool, mapping spawn failures and non-zero exits to errors
pub(crate) fn run_tool(tool: &str, command: &mut Command) -> Result<Output> {
    debug!("Running {}: {:?}", tool, command);

    let output = command.output().map_err(|e| StemgridError::ToolUnavailable {
        tool: tool.to_string(),
        reason: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(StemgridError::tool_failed(
            tool,
            format!("{}: {}", output.status, tail.join(" | ")),
        ));
    }

    Ok(output)
}

/// First `.wav` file under `dir` whose lowercase stem satisfies `matches`,
/// preferring files inside `preferred`
pub(crate) fn find_wav(dir: &Path, preferred: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            let is_wav = p
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            let stem = p
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| s.to_lowercase())
                .unwrap_or_default();
            is_wav && matches(&stem)
        })
        .collect();

    found.sort_by_key(|p| !p.starts_with(preferred));
    found.into_iter().next()
}

/// Stem separator used when stems are disabled
pub struct UnavailableStemSeparator;

impl StemSeparator for UnavailableStemSeparator {
    fn separate(&self, input_path: &Path, _work_dir: &Path) -> Result<StemPaths> {
        Err(StemgridError::ToolUnavailable {
            tool: "stem separator".to_string(),
            reason: format!("not configured for '{}'", input_path.display()),
        })
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

/// Drum separator used when drum splitting is disabled
pub struct UnavailableDrumSeparator;

impl DrumSeparator for UnavailableDrumSeparator {
    fn separate(&self, drum_stem: &Path, _work_dir: &Path) -> Result<DrumPaths> {
        Err(StemgridError::ToolUnavailable {
            tool: "drum separator".to_string(),
            reason: format!("not configured for '{}'", drum_stem.display()),
        })
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_wav_prefers_expected_folder() {
        let dir = TempDir::new().unwrap();
        let preferred = dir.path().join("htdemucs").join("song");
        let other = dir.path().join("stale");
        std::fs::create_dir_all(&preferred).unwrap();
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("bass.wav"), b"x").unwrap();
        std::fs::write(preferred.join("bass.wav"), b"x").unwrap();
        std::fs::write(preferred.join("bass.mp3"), b"x").unwrap();

        let found = find_wav(dir.path(), &preferred, |s| s == "bass").unwrap();
        assert_eq!(found, preferred.join("bass.wav"));
        assert!(find_wav(dir.path(), &preferred, |s| s == "vocals").is_none());
    }

    #[test]
    fn test_missing_tool_is_unavailable() {
        let err = run_tool("demucs", &mut Command::new("/nonexistent/stemgrid-tool")).unwrap_err();
        assert!(err.is_stem_error());
    }

    #[test]
    fn test_unavailable_separators() {
        assert!(!UnavailableStemSeparator.is_available());
        assert!(UnavailableDrumSeparator
            .separate(Path::new("drums.wav"), Path::new("/tmp"))
            .is_err());
    }
}
