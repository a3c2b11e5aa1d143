//! Structured progress reporting
//!
//! Workers send `ProgressEvent`s over a channel; a listener thread owns the
//! progress bar. Nothing here parses log output.

use crossbeam_channel::{unbounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::trace;

/// What a track is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyzing,
    Analyzed,
    Skipped,
    Failed,
    Separating,
    SplittingDrums,
    Chopping,
    StemsDone,
    StemsFailed,
}

impl Stage {
    /// True for the stages that end a track's analysis
    pub fn finishes_analysis(self) -> bool {
        matches!(self, Stage::Analyzed | Stage::Skipped | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Analyzing => "analyzing",
            Stage::Analyzed => "analyzed",
            Stage::Skipped => "skipped",
            Stage::Failed => "failed",
            Stage::Separating => "separating stems",
            Stage::SplittingDrums => "splitting drums",
            Stage::Chopping => "chopping",
            Stage::StemsDone => "stems done",
            Stage::StemsFailed => "stems failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub track_id: i32,
    pub file_name: String,
    pub stage: Stage,
}

/// Counts seen by the listener, returned when it shuts down
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTally {
    pub analyzed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stems_done: usize,
    pub stems_failed: usize,
}

/// Handle to the listener thread
pub struct ProgressListener {
    tx: Sender<ProgressEvent>,
    handle: JoinHandle<ProgressTally>,
}

impl ProgressListener {
    /// Start a listener for `total` tracks; the bar is hidden unless `visible`
    pub fn spawn(total: usize, visible: bool) -> Self {
        let (tx, rx) = unbounded::<ProgressEvent>();
        let bar = if visible {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let handle = thread::spawn(move || listen(rx, bar));
        Self { tx, handle }
    }

    pub fn sender(&self) -> Sender<ProgressEvent> {
        self.tx.clone()
    }

    /// Close the channel and wait for the listener. Every cloned sender must
    /// already be dropped, otherwise this blocks until they are.
    pub fn finish(self) -> ProgressTally {
        drop(self.tx);
        self.handle.join().unwrap_or_default()
    }
}

fn listen(rx: Receiver<ProgressEvent>, bar: ProgressBar) -> ProgressTally {
    let mut tally = ProgressTally::default();

    for event in rx {
        trace!("{} [{}] {}", event.file_name, event.track_id, event.stage);

        match event.stage {
            Stage::Analyzed => tally.analyzed += 1,
            Stage::Skipped => tally.skipped += 1,
            Stage::Failed => tally.failed += 1,
            Stage::StemsDone => tally.stems_done += 1,
            Stage::StemsFailed => tally.stems_failed += 1,
            _ => {}
        }

        if event.stage.finishes_analysis() {
            bar.inc(1);
        }
        bar.set_message(format!("{} ({})", event.file_name, event.stage));
    }

    bar.finish_with_message("done");
    tally
}

/// Send an event, ignoring a closed listener
pub fn report(tx: &Sender<ProgressEvent>, track_id: i32, file_name: &str, stage: Stage) {
    let _ = tx.send(ProgressEvent {
        track_id,
        file_name: file_name.to_string(),
        stage,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_tallies_events() {
        let listener = ProgressListener::spawn(3, false);
        let tx = listener.sender();
        report(&tx, 1, "a.wav", Stage::Analyzing);
        report(&tx, 1, "a.wav", Stage::Analyzed);
        report(&tx, 2, "b.wav", Stage::Failed);
        report(&tx, 3, "c.wav", Stage::Skipped);
        report(&tx, 1, "a.wav", Stage::StemsDone);
        drop(tx);

        let tally = listener.finish();
        assert_eq!(
            tally,
            ProgressTally {
                analyzed: 1,
                skipped: 1,
                failed: 1,
                stems_done: 1,
                stems_failed: 0,
            }
        );
    }

    #[test]
    fn test_terminal_stages() {
        assert!(Stage::Failed.finishes_analysis());
        assert!(!Stage::Chopping.finishes_analysis());
    }
}
