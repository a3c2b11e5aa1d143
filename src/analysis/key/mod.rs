//! Key detection
//!
//! Key detection is delegated to an external command. Its output lines look
//! like `A minor 0.82`; every parseable line becomes a ranked candidate.

pub mod camelot;

use crate::analysis::traits::KeyDetector;
use crate::error::{Result, StemgridError};
use crate::types::{KeyCandidate, Mode, PitchClass};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Key detector backed by an external command (audio path is the last argument)
#[derive(Debug, Clone)]
pub struct CommandKeyDetector {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandKeyDetector {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl KeyDetector for CommandKeyDetector {
    fn detect(&self, path: &Path) -> Result<Vec<KeyCandidate>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| StemgridError::ToolUnavailable {
                tool: self.name().to_string(),
                reason: format!("{}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StemgridError::tool_failed(
                self.name(),
                format!("{} ({})", output.status, stderr.trim()),
            ));
        }

        let candidates = parse_key_output(&String::from_utf8_lossy(&output.stdout));
        debug!("Key detector returned {} candidates", candidates.len());
        Ok(candidates)
    }

    fn name(&self) -> &'static str {
        "key-detector"
    }
}

/// Detector used when no key command is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoKeyDetector;

impl KeyDetector for NoKeyDetector {
    fn detect(&self, _path: &Path) -> Result<Vec<KeyCandidate>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Parse `<tonic> <major|minor> [confidence]` lines, best first
///
/// Lines with an unknown tonic or mode are skipped. Candidates without a
/// confidence sort after those with one.
pub fn parse_key_output(output: &str) -> Vec<KeyCandidate> {
    let mut candidates: Vec<KeyCandidate> = output
        .lines()
        .filter_map(|line| {
            let mut fields = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty());
            let pitch = PitchClass::parse(fields.next()?)?;
            let mode = Mode::parse(fields.next()?)?;
            let confidence = fields
                .next()
                .and_then(|c| c.parse::<f64>().ok())
                .filter(|c| c.is_finite())
                .map(|c| c.clamp(0.0, 1.0));
            Some(camelot::key_candidate(pitch, mode, confidence))
        })
        .collect();

    candidates.sort_by(|a, b| match (a.confidence, b.confidence) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    candidates
}
