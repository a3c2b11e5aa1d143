//! Primary tempo predictors
//!
//! The ML tempo model is an external program. It receives a 16-bit mono WAV
//! path as its last argument and prints `<bpm> <confidence>` on stdout.

use crate::analysis::traits::TempoPredictor;
use crate::audio::wav::write_mono_pcm16;
use crate::error::{Result, StemgridError};
use crate::types::AudioBuffer;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

/// Predictor backed by an external command
#[derive(Debug, Clone)]
pub struct CommandTempoPredictor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandTempoPredictor {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace separated command line ("python predict.py")
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts.map(str::to_string).collect()))
    }
}

impl TempoPredictor for CommandTempoPredictor {
    fn predict(&self, buffer: &AudioBuffer) -> Result<(f64, f64)> {
        let tool = self.name();
        let input = tempfile::Builder::new()
            .prefix("stemgrid-tempo-")
            .suffix(".wav")
            .tempfile()?;
        write_mono_pcm16(input.path(), buffer)?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input.path())
            .output()
            .map_err(|e| StemgridError::ToolUnavailable {
                tool: tool.to_string(),
                reason: format!("{}: {}", self.program.display(), e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StemgridError::tool_failed(
                tool,
                format!("{} ({})", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("Tempo predictor output: {}", stdout.trim());

        parse_prediction(&stdout).ok_or_else(|| {
            StemgridError::tool_failed(tool, format!("unparseable output '{}'", stdout.trim()))
        })
    }

    fn name(&self) -> &'static str {
        "tempo-predictor"
    }
}

/// Parse the last non-empty `<bpm> <confidence>` line
pub fn parse_prediction(output: &str) -> Option<(f64, f64)> {
    let line = output.lines().rev().find(|l| !l.trim().is_empty())?;
    let mut fields = line.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
    let bpm = fields.next()?.parse().ok()?;
    let confidence = fields.next()?.parse().ok()?;
    Some((bpm, confidence))
}

/// Predictor used when no ML model is configured; always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableTempoPredictor;

impl TempoPredictor for UnavailableTempoPredictor {
    fn predict(&self, _buffer: &AudioBuffer) -> Result<(f64, f64)> {
        Err(StemgridError::ToolUnavailable {
            tool: "tempo-predictor".to_string(),
            reason: "no ML tempo model configured".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
