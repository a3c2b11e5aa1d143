//! Demucs stem separator
//!
//! Runs `<demucs> -n htdemucs -o <work dir> <input>` and collects
//! `<work dir>/htdemucs/<input stem>/{drums,bass,vocals,other}.wav`.

use super::{find_wav, run_tool};
use crate::analysis::traits::StemSeparator;
use crate::error::{Result, StemgridError};
use crate::types::{StemKind, StemPaths};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Demucs model name
pub const DEMUCS_MODEL: &str = "htdemucs";

pub struct DemucsSeparator {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl DemucsSeparator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Build from a command line such as `python -m demucs`
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: PathBuf::from(program),
            extra_args: parts.map(str::to_string).collect(),
        })
    }

    fn command(&self, input_path: &Path, work_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg("-n")
            .arg(DEMUCS_MODEL)
            .arg("-o")
            .arg(work_dir)
            .arg(input_path);
        command
    }
}

impl StemSeparator for DemucsSeparator {
    fn separate(&self, input_path: &Path, work_dir: &Path) -> Result<StemPaths> {
        let base = input_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Separating stems for {}", input_path.display());
        run_tool(self.name(), &mut self.command(input_path, work_dir))?;

        let expected_dir = work_dir.join(DEMUCS_MODEL).join(&base);
        let mut stems = StemPaths::new();
        for kind in StemKind::ALL {
            let path = find_wav(work_dir, &expected_dir, |s| s == kind.name()).ok_or_else(|| {
                StemgridError::tool_failed(
                    self.name(),
                    format!("no {} stem in {}", kind.name(), expected_dir.display()),
                )
            })?;
            stems.insert(kind, path);
        }
        Ok(stems)
    }

    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .args(&self.extra_args)
            .arg("--help")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "demucs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let sep = DemucsSeparator::from_command_line("python3 -m demucs").unwrap();
        let cmd = sep.command(Path::new("in/song.mp3"), Path::new("/tmp/work"));
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "python3");
        assert_eq!(
            args,
            vec!["-m", "demucs", "-n", "htdemucs", "-o", "/tmp/work", "in/song.mp3"]
        );
    }

    #[test]
    fn test_missing_program_not_available() {
        assert!(!DemucsSeparator::new("/nonexistent/demucs").is_available());
    }
}
