//! CLI argument parsing

use clap::Parser;
use std::path::PathBuf;

/// stemgrid - tempo, downbeats and bar-exact stem chopping for DJs
///
/// Analyses tracks for BPM, key, music type and downbeats, optionally
/// separates stems and drum parts, and cuts stems into N-bar segments.
#[derive(Parser, Debug)]
#[command(name = "stemgrid")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Input path (file or directory)
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Output directory for stems, segments and the JSON report
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Separate stems (drums, bass, vocals, other) with demucs
    #[arg(long)]
    pub stems: bool,

    /// Split the drum stem into kick, snare, cymbals and toms (needs --stems)
    #[arg(long)]
    pub drums: bool,

    /// Chop separated stems into bar-exact segments (needs --stems)
    #[arg(long)]
    pub chop: bool,

    /// Bars per segment
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub bars: usize,

    /// Use this BPM instead of detecting it
    #[arg(long, value_name = "BPM")]
    pub bpm: Option<f64>,

    /// Use this Camelot key (e.g. 8A) instead of detecting it
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,

    /// Start segments at the first detected downbeat instead of sample 0
    #[arg(long)]
    pub align_downbeat: bool,

    /// Only chop existing stem WAVs found at --input (BPM from --bpm or file names)
    #[arg(long)]
    pub segment_only: bool,

    /// Demucs command (default: $STEMGRID_DEMUCS or "demucs")
    #[arg(long, value_name = "CMD")]
    pub demucs_cmd: Option<String>,

    /// Path to the drumsep script (default: $STEMGRID_DRUMSEP)
    #[arg(long, value_name = "PATH")]
    pub drumsep_script: Option<PathBuf>,

    /// ML tempo predictor command (default: $STEMGRID_TEMPO_CMD)
    #[arg(long, value_name = "CMD")]
    pub tempo_cmd: Option<String>,

    /// Key detector command (default: $STEMGRID_KEY_CMD)
    #[arg(long, value_name = "CMD")]
    pub key_cmd: Option<String>,

    /// Number of worker threads (defaults to CPU count - 1)
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Scan subdirectories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Re-analyse tracks already present in the JSON report
    #[arg(long)]
    pub force: bool,

    /// Do not write the JSON report
    #[arg(long)]
    pub no_json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only, no progress bar)
    #[arg(short, long)]
    pub quiet: bool,

    /// Show files that would be processed without processing them
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Log filter directive for the verbosity flags
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["stemgrid", "-i", "in", "-o", "out"]);
        assert_eq!(cli.bars, 8);
        assert!(!cli.stems && !cli.chop && !cli.recursive);
        assert_eq!(cli.log_filter(), "warn");
    }

    #[test]
    fn test_full_flags() {
        let cli = Cli::parse_from([
            "stemgrid", "-i", "in", "-o", "out", "--stems", "--drums", "--chop", "--bars", "4",
            "--bpm", "126.5", "--key", "8A", "-vv", "-j", "3",
        ]);
        assert!(cli.stems && cli.drums && cli.chop);
        assert_eq!(cli.bars, 4);
        assert_eq!(cli.bpm, Some(126.5));
        assert_eq!(cli.key.as_deref(), Some("8A"));
        assert_eq!(cli.threads, Some(3));
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn test_quiet_wins() {
        let cli = Cli::parse_from(["stemgrid", "-i", "a", "-o", "b", "-vvv", "-q"]);
        assert_eq!(cli.log_filter(), "error");
    }
}
