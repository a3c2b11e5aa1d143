//! Runtime configuration settings

use crate::analysis::key::camelot::normalize_camelot;
use crate::error::{Result, StemgridError};
use crate::segment::BarSegmenter;
use std::path::PathBuf;

/// Environment variable for the demucs command
pub const ENV_DEMUCS: &str = "STEMGRID_DEMUCS";
/// Environment variable for the drumsep script
pub const ENV_DRUMSEP: &str = "STEMGRID_DRUMSEP";
/// Environment variable for the ML tempo predictor command
pub const ENV_TEMPO_CMD: &str = "STEMGRID_TEMPO_CMD";
/// Environment variable for the key detector command
pub const ENV_KEY_CMD: &str = "STEMGRID_KEY_CMD";

/// Demucs command used when nothing is configured
pub const DEFAULT_DEMUCS: &str = "demucs";

/// Runtime settings for the pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    /// Input path (file or directory)
    pub input: PathBuf,
    /// Output directory
    pub output: PathBuf,
    /// Run stem separation
    pub stems_enabled: bool,
    /// Run drum sub-separation on the drum stem
    pub drums_enabled: bool,
    /// Chop stems into segments
    pub chop_enabled: bool,
    pub bars_per_segment: usize,
    /// Manual BPM, bypassing detection
    pub bpm_override: Option<f64>,
    /// Manual Camelot key, bypassing detection
    pub key_override: Option<String>,
    /// Offset segments to the first detected downbeat
    pub align_downbeat: bool,
    /// Chop existing stems only
    pub segment_only: bool,
    pub demucs_cmd: String,
    pub drumsep_script: Option<PathBuf>,
    pub tempo_cmd: Option<String>,
    pub key_cmd: Option<String>,
    /// Number of analysis worker threads
    pub analysis_threads: usize,
    /// Scan recursively
    pub recursive: bool,
    /// Overwrite existing analysis
    pub force: bool,
    /// Write the JSON report
    pub output_json: bool,
    /// Show progress bars
    pub show_progress: bool,
    /// Dry run mode - show files without processing
    pub dry_run: bool,
}

impl Settings {
    /// Create settings from CLI arguments and the process environment
    pub fn from_cli(cli: &super::cli::Cli) -> Self {
        Self::from_cli_with_env(cli, |name| std::env::var(name).ok())
    }

    /// Create settings with an explicit environment lookup
    pub fn from_cli_with_env(cli: &super::cli::Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        // Reserve one core for the stem worker when stems are enabled
        let reserved = if cli.stems { 2 } else { 1 };
        let default_threads = num_cpus::get().saturating_sub(reserved).max(1);

        Self {
            input: cli.input.clone(),
            output: cli.output.clone(),
            stems_enabled: cli.stems,
            drums_enabled: cli.drums,
            chop_enabled: cli.chop,
            bars_per_segment: cli.bars,
            bpm_override: cli.bpm,
            key_override: cli.key.clone(),
            align_downbeat: cli.align_downbeat,
            segment_only: cli.segment_only,
            demucs_cmd: non_empty(cli.demucs_cmd.clone())
                .or_else(|| non_empty(env(ENV_DEMUCS)))
                .unwrap_or_else(|| DEFAULT_DEMUCS.to_string()),
            drumsep_script: cli
                .drumsep_script
                .clone()
                .or_else(|| non_empty(env(ENV_DRUMSEP)).map(PathBuf::from)),
            tempo_cmd: non_empty(cli.tempo_cmd.clone()).or_else(|| non_empty(env(ENV_TEMPO_CMD))),
            key_cmd: non_empty(cli.key_cmd.clone()).or_else(|| non_empty(env(ENV_KEY_CMD))),
            analysis_threads: cli.threads.unwrap_or(default_threads).max(1),
            recursive: cli.recursive,
            force: cli.force,
            output_json: !cli.no_json,
            show_progress: !cli.quiet,
            dry_run: cli.dry_run,
        }
    }

    /// Reject combinations that would fail later or silently do nothing
    pub fn validate(&self) -> Result<()> {
        if self.bars_per_segment == 0 {
            return Err(StemgridError::ConfigError(
                "--bars must be at least 1".to_string(),
            ));
        }
        if let Some(bpm) = self.bpm_override {
            if !bpm.is_finite() || bpm <= 0.0 {
                return Err(StemgridError::ConfigError(format!(
                    "--bpm must be a positive number, got {}",
                    bpm
                )));
            }
            BarSegmenter::new(bpm, self.bars_per_segment)
                .map_err(|e| StemgridError::ConfigError(format!("--bars/--bpm: {}", e)))?;
        }
        if let Some(key) = &self.key_override {
            if normalize_camelot(key).is_none() {
                return Err(StemgridError::ConfigError(format!(
                    "--key must be a Camelot code between 1A and 12B, got '{}'",
                    key
                )));
            }
        }
        if self.segment_only && self.stems_enabled {
            return Err(StemgridError::ConfigError(
                "--segment-only works on existing stems and cannot be combined with --stems"
                    .to_string(),
            ));
        }
        if self.drums_enabled && !self.stems_enabled {
            return Err(StemgridError::ConfigError(
                "--drums needs --stems (the drum stem comes from stem separation)".to_string(),
            ));
        }
        if self.chop_enabled && !self.stems_enabled {
            return Err(StemgridError::ConfigError(
                "--chop needs --stems; use --segment-only to chop existing stems".to_string(),
            ));
        }
        if self.drums_enabled && self.drumsep_script.is_none() {
            return Err(StemgridError::ConfigError(format!(
                "--drums needs --drumsep-script or ${}",
                ENV_DRUMSEP
            )));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("."),
            output: PathBuf::from("./output"),
            stems_enabled: false,
            drums_enabled: false,
            chop_enabled: false,
            bars_per_segment: 8,
            bpm_override: None,
            key_override: None,
            align_downbeat: false,
            segment_only: false,
            demucs_cmd: DEFAULT_DEMUCS.to_string(),
            drumsep_script: None,
            tempo_cmd: None,
            key_cmd: None,
            analysis_threads: num_cpus::get().saturating_sub(1).max(1),
            recursive: false,
            force: false,
            output_json: true,
            show_progress: true,
            dry_run: false,
        }
    }
}
