//! drumsep drum separator
//!
//! Runs `bash <script> <drum stem> <work dir>`. The model writes Spanish part
//! names (`bombo`, `redoblante`, `platillos`, `toms`) under
//! `<work dir>/49469ca8/`.

use super::{find_wav, run_tool};
use crate::analysis::traits::DrumSeparator;
use crate::error::{Result, StemgridError};
use crate::types::{DrumPart, DrumPaths};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// drumsep model identifier, also its output folder
pub const DRUMSEP_MODEL_ID: &str = "49469ca8";

/// Output name the model uses for each part
pub fn drumsep_label(part: DrumPart) -> &'static str {
    match part {
        DrumPart::Kick => "bombo",
        DrumPart::Snare => "redoblante",
        DrumPart::Cymbals => "platillos",
        DrumPart::Toms => "toms",
    }
}

pub struct DrumsepSeparator {
    script: PathBuf,
}

impl DrumsepSeparator {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }

    fn command(&self, drum_stem: &Path, work_dir: &Path) -> Command {
        let mut command = Command::new("bash");
        command.arg(&self.script).arg(drum_stem).arg(work_dir);
        command
    }
}

impl DrumSeparator for DrumsepSeparator {
    fn separate(&self, drum_stem: &Path, work_dir: &Path) -> Result<DrumPaths> {
        info!("Splitting drums for {}", drum_stem.display());
        run_tool(self.name(), &mut self.command(drum_stem, work_dir))?;

        let base = drum_stem
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected_dir = work_dir.join(DRUMSEP_MODEL_ID).join(base);

        let mut parts = DrumPaths::new();
        for part in DrumPart::ALL {
            let label = drumsep_label(part);
            match find_wav(work_dir, &expected_dir, |s| s == label || s.ends_with(&format!("_{}", label))) {
                Some(path) => {
                    parts.insert(part, path);
                }
                None => warn!("drumsep produced no {} part", part.name()),
            }
        }

        if parts.is_empty() {
            return Err(StemgridError::tool_failed(
                self.name(),
                format!("no drum parts found in {}", work_dir.display()),
            ));
        }
        Ok(parts)
    }

    fn is_available(&self) -> bool {
        self.script.is_file()
    }

    fn name(&self) -> &'static str {
        "drumsep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(drumsep_label(DrumPart::Kick), "bombo");
        assert_eq!(drumsep_label(DrumPart::Cymbals), "platillos");
    }

    #[test]
    fn test_command_shape() {
        let sep = DrumsepSeparator::new("/opt/drumsep/drumsep");
        let cmd = sep.command(Path::new("drums.wav"), Path::new("/tmp/w"));
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "bash");
        assert_eq!(args, vec!["/opt/drumsep/drumsep", "drums.wav", "/tmp/w"]);
    }

    #[test]
    fn test_missing_script_not_available() {
        assert!(!DrumsepSeparator::new("/nonexistent/drumsep").is_available());
    }
}
