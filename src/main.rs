//! stemgrid CLI entry point

use clap::Parser;
use std::process::ExitCode;
use stemgrid::config::{Cli, Settings};
use stemgrid::pipeline::{self, PipelineResult};
use stemgrid::StemgridError;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);
    let settings = Settings::from_cli(&cli);

    if let Err(e) = validate_inputs(&cli, &settings) {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }

    match pipeline::run(&settings) {
        Ok(result) => {
            println!();
            println!("{}", summary_line(&result, settings.segment_only));
            if result.failed > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e @ StemgridError::ConfigError(_)) => {
            eprintln!("Error: {}\n\n  Run `stemgrid --help` for the available options.", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    // RUST_LOG wins over -v/-q
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// One-line outcome; segment-only runs count stems, not tracks
fn summary_line(result: &PipelineResult, segment_only: bool) -> String {
    if segment_only {
        format!(
            "Summary: {} stems chopped, {} failed, {} skipped (of {} stems)",
            result.successful, result.failed, result.skipped, result.total_files
        )
    } else {
        format!(
            "Summary: {} tracks analyzed, {} failed, {} skipped (of {} tracks)",
            result.successful, result.failed, result.skipped, result.total_files
        )
    }
}

fn validate_inputs(cli: &Cli, settings: &Settings) -> Result<(), String> {
    if !cli.input.exists() {
        return Err(format!(
            "Input path does not exist: {}\n\n  Usage:\n    stemgrid -i ~/Music/DJ -o ./out --stems --chop\n    stemgrid -i ./stems -o ./out --segment-only --bpm 128",
            cli.input.display()
        ));
    }

    if settings.segment_only && cli.input.is_file() {
        let is_wav = cli
            .input
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if !is_wav {
            return Err(format!(
                "--segment-only chops WAV stems, got {}",
                cli.input.display()
            ));
        }
    }

    if let Some(parent) = cli.output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(format!(
                "Output parent directory does not exist: {}\n\n  stemgrid creates {} itself, but not its parents.\n  Try: mkdir -p {}",
                parent.display(),
                cli.output.display(),
                parent.display()
            ));
        }
    }

    settings.validate().map_err(|e| e.to_string())
}
